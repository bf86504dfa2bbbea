


use crate::limiters::mail::MailTemplate;


/* -----------------
    the notification dispatch the throttled email path hands off to, whatever
    actually delivers the message (smtp relay, queue producer) lives outside
    this crate, all we need is a send that tells us whether it went out.
    the returned future is Send so the throttle can run inside spawned tasks.
*/
pub trait Mailer: Send + Sync{
    fn send(&self, recipient: &str, template: &MailTemplate, payload: &serde_json::Value)
        -> impl std::future::Future<Output = Result<(), String>> + Send;
}

// logs the message instead of delivering it, used by the cli and in dev
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer{
    async fn send(&self, recipient: &str, template: &MailTemplate, payload: &serde_json::Value) -> Result<(), String> {
        log::info!("📧 sending {} mail to {} with {}", template, recipient, payload);
        Ok(())
    }
}
