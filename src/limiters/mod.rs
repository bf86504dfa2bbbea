


/* ---------------------------------------------------------------
  ╰┈➤    keyed fixed window rate limiter
   ---------------------------------------------------------------
    the record's presence is the limit, there's no counter: set_limit writes
    `<prefix><key>` with a ttl of one window and until the store expires it
    every is_limited check on the key says yes.

    is_limited then set_limit is check-then-act, two instances can both see
    "not limited" and both go ahead, that's accepted for notification
    throttling, use try_acquire where one winner per window actually matters.

    the limiter fails open, an unreachable store must not stop mails going out.
*/

pub mod mail;

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use crate::config::CoordConfig;
use crate::error::StorageError;
use crate::interfaces::store::CoordStore;


#[derive(Clone)]
pub struct RateLimiter{
    store: Arc<dyn CoordStore>,
    prefix: String,
    default_window: Duration,
}

impl RateLimiter{

    pub fn new(store: Arc<dyn CoordStore>, config: &CoordConfig) -> Self{
        Self{
            store,
            prefix: config.rate_limit_prefix.clone(),
            default_window: config.rate_limit_window,
        }
    }

    pub fn default_window(&self) -> Duration{
        self.default_window
    }

    fn record_key(&self, key: &str) -> String{
        format!("{}{}", self.prefix, key)
    }

    pub async fn is_limited(&self, key: &str) -> bool{
        match self.store.exists(&self.record_key(key)).await{
            Ok(limited) => limited,
            Err(e) => {
                log::error!("coordination store failed on rate limit check of {}: {}, letting it through", key, e);
                false
            }
        }
    }

    /// Starts a window on `key`, `None` uses the configured default window.
    /// The record holds the time it was set, for diagnostics only.
    pub async fn set_limit(&self, key: &str, window: Option<Duration>) -> Result<(), StorageError>{
        let window = window.unwrap_or(self.default_window);
        self.store.set_px(&self.record_key(key), &Utc::now().to_rfc3339(), window).await?;
        log::debug!("⏳ rate limited {} for {:?}", key, window);
        Ok(())
    }

    // zero when not limited or when the store can't be asked
    pub async fn remaining_time(&self, key: &str) -> Duration{
        match self.store.pttl(&self.record_key(key)).await{
            Ok(ttl) => ttl.unwrap_or(Duration::ZERO),
            Err(e) => {
                log::error!("coordination store failed on remaining time of {}: {}", key, e);
                Duration::ZERO
            }
        }
    }

    /// Atomic check and set: true if this call opened a new window on `key`
    /// and may go ahead, false if a window is already running.
    pub async fn try_acquire(&self, key: &str, window: Option<Duration>) -> bool{
        let window = window.unwrap_or(self.default_window);
        match self.store.set_nx_px(&self.record_key(key), &Utc::now().to_rfc3339(), window).await{
            Ok(acquired) => acquired,
            Err(e) => {
                log::error!("coordination store failed on rate limit acquire of {}: {}, letting it through", key, e);
                true
            }
        }
    }

    // when the running window on `key` was opened
    pub async fn limited_since(&self, key: &str) -> Option<chrono::DateTime<chrono::FixedOffset>>{
        let value = self.store.get(&self.record_key(key)).await.ok()??;
        chrono::DateTime::parse_from_rfc3339(&value).ok()
    }

}
