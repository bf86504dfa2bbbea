


/*
    castkeeper, a distributed coordination layer for request handling code:

        lockers  ▶ mutual exclusion keyed by business identifiers, released
                   right away or after the ambient transaction completes
        limiters ▶ keyed fixed window rate limits, mail throttling on top

    both sit on one shared ttl based store (redis in a cluster, ram in a
    single process), see storage::engine for the wiring.
*/

pub mod appstate;
pub mod cli;
pub mod config;
pub mod consts;
pub mod error;
pub mod interfaces;
pub mod limiters;
pub mod lockers;
pub mod services;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{CoordErrorResponse, LockError, StorageError};
pub use limiters::RateLimiter;
pub use limiters::mail::{MailTemplate, MailThrottle, Throttled};
pub use lockers::{LockOptions, TimeUnit};
pub use lockers::dlm::DistLock;
pub use lockers::keys::{key_fn, ArgBindings, KeyResolver, KeyTemplate};
pub use lockers::txguard::{with_lock, Coordinated};
