


use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use crate::consts::EMAIL_LIMIT_KEY_PREFIX;
use super::RateLimiter;


#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MailTemplate{
    Invitation,
    ApplicationReceived,
    ShortlistUpdated,
    SubmissionReminder,
    PasswordReset,
    Custom(String),
}

impl std::fmt::Display for MailTemplate{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self{
            MailTemplate::Invitation => write!(f, "INVITATION"),
            MailTemplate::ApplicationReceived => write!(f, "APPLICATION_RECEIVED"),
            MailTemplate::ShortlistUpdated => write!(f, "SHORTLIST_UPDATED"),
            MailTemplate::SubmissionReminder => write!(f, "SUBMISSION_REMINDER"),
            MailTemplate::PasswordReset => write!(f, "PASSWORD_RESET"),
            MailTemplate::Custom(name) => {
                let name: String = name.trim()
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric(){ c.to_ascii_uppercase() } else{ '_' })
                    .collect();
                write!(f, "{}", name)
            },
        }
    }
}

impl FromStr for MailTemplate{
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        if normalized.is_empty(){
            return Err(String::from("empty mail template"));
        }
        Ok(match normalized.as_str(){
            "INVITATION" => MailTemplate::Invitation,
            "APPLICATION_RECEIVED" => MailTemplate::ApplicationReceived,
            "SHORTLIST_UPDATED" => MailTemplate::ShortlistUpdated,
            "SUBMISSION_REMINDER" => MailTemplate::SubmissionReminder,
            "PASSWORD_RESET" => MailTemplate::PasswordReset,
            _ => MailTemplate::Custom(normalized),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Throttled<T>{
    Sent(T),
    Suppressed{ retry_in: Duration },
}

impl<T> Throttled<T>{
    pub fn is_sent(&self) -> bool{
        matches!(self, Throttled::Sent(_))
    }
}


/* -----------------
    at most one mail per recipient and template within a window, the
    recipient is trimmed and lowercased so `Alice@Example.com ` and
    `alice@example.com` share the same budget.
*/
#[derive(Clone)]
pub struct MailThrottle{
    limiter: RateLimiter,
    window: Duration,
}

impl MailThrottle{

    pub fn new(limiter: RateLimiter, window: Duration) -> Self{
        Self{ limiter, window }
    }

    pub fn window(&self) -> Duration{
        self.window
    }

    pub fn key(recipient: &str, template: &MailTemplate) -> String{
        format!("{}:{}:{}", EMAIL_LIMIT_KEY_PREFIX, recipient.trim().to_lowercase(), template)
    }

    pub async fn is_throttled(&self, recipient: &str, template: &MailTemplate) -> bool{
        self.limiter.is_limited(&Self::key(recipient, template)).await
    }

    pub async fn mark_sent(&self, recipient: &str, template: &MailTemplate){
        let key = Self::key(recipient, template);
        // the mail is already out, a failed write only costs us one extra mail later
        if let Err(e) = self.limiter.set_limit(&key, Some(self.window)).await{
            log::warn!("couldn't record throttle window for {}: {}", key, e);
        }
    }

    pub async fn remaining(&self, recipient: &str, template: &MailTemplate) -> Duration{
        self.limiter.remaining_time(&Self::key(recipient, template)).await
    }

    /// Runs `action` unless the recipient got this template within the window,
    /// a successful action opens a new window, a failed one leaves none behind.
    pub async fn send_throttled<T, E, F, Fut>(&self, recipient: &str, template: &MailTemplate, action: F) -> Result<Throttled<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>
    {
        if self.is_throttled(recipient, template).await{
            let retry_in = self.remaining(recipient, template).await;
            log::info!("📭 suppressed {} mail to {}, retry in {:?}", template, recipient, retry_in);
            return Ok(Throttled::Suppressed{ retry_in });
        }

        let sent = action().await?;
        self.mark_sent(recipient, template).await;
        Ok(Throttled::Sent(sent))
    }

}
