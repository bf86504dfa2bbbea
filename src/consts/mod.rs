


use std::time::Duration;
use rand::Rng;


pub const APP_NAME: &str = "Castkeeper";

// defaults every coordinated operation falls back to when the call site
// doesn't declare its own wait/lease times, both in LOCK_DEFAULT_UNIT
pub const LOCK_DEFAULT_WAIT: u64 = 30;
pub const LOCK_DEFAULT_LEASE: u64 = 30;
pub const LOCK_DEFAULT_UNIT: &str = "seconds";
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const LOCK_KEY_PREFIX: &str = "lock:";
// cap on any ttl handed to a store, a lease of Duration::MAX can't be put on a clock
pub const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub const RATE_LIMIT_KEY_PREFIX: &str = "rate-limit:";
pub const RATE_LIMIT_DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const EMAIL_LIMIT_KEY_PREFIX: &str = "email";

// receiver binding name inside a key template, like {this}
pub const RECEIVER_BINDING: &str = "this";

// every code has 2 bytes long since the code value is larger than
// 255 we've used u16 which is 2 chars in hex
pub static STORAGE_IO_ERROR_CODE: &u16 = &0xFFFF;
pub static RESOURCE_BUSY_ERROR_CODE: &u16 = &0xFFF0;
pub static KEY_RESOLUTION_ERROR_CODE: &u16 = &0xFFF1;
pub static CONFIG_ERROR_CODE: &u16 = &0xFFF2;
pub static TX_ERROR_CODE: &u16 = &0xFFF3;
pub static DISPATCH_ERROR_CODE: &u16 = &0xFFF4;
pub static CODEC_ERROR_CODE: &u16 = &0xFFFB;

pub const RESOURCE_BUSY: &str = "Resource Busy, Try Again Later";

/* polling delay of the lock waiter, the base interval plus up to a quarter of it as
   jitter so waiters coming from different instances don't hammer the store in lockstep,
   never sleeps past what's left of the wait budget
*/
pub fn jittered_delay(base: Duration, remaining: Duration) -> Duration{
    let quarter = (base.as_millis() / 4) as u64;
    let jitter = if quarter > 0{
        rand::thread_rng().gen_range(0..=quarter)
    } else{
        0
    };
    std::cmp::min(base.saturating_add(Duration::from_millis(jitter)), remaining)
}
