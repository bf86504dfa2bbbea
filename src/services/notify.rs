


use crate::error::{CoordErrorResponse, DispatchError};
use crate::interfaces::mail::Mailer;
use crate::limiters::mail::{MailTemplate, MailThrottle, Throttled};
use crate::types::CoordResult;


// templated mails throttled per recipient and template
#[derive(Clone)]
pub struct NotifyService<M>{
    throttle: MailThrottle,
    mailer: M,
}

impl<M: Mailer> NotifyService<M>{

    pub fn new(throttle: MailThrottle, mailer: M) -> Self{
        Self{ throttle, mailer }
    }

    pub fn throttle(&self) -> &MailThrottle{
        &self.throttle
    }

    pub async fn notify(&self, recipient: &str, template: MailTemplate, payload: serde_json::Value) -> CoordResult<Throttled<()>>{
        self.throttle.send_throttled(recipient, &template, || async{
            self.mailer
                .send(recipient, &template, &payload)
                .await
                .map_err(|reason| CoordErrorResponse::from(DispatchError::Mail{
                    recipient: recipient.to_string(),
                    template: template.to_string(),
                    reason
                }))
        }).await
    }

}
