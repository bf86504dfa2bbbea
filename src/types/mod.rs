


use std::collections::HashMap;
use crate::error;

pub type RedisPoolConnection = deadpool_redis::Pool;
// in memory coordination records: key -> (value, expiry instant)
pub type RamDb = std::sync::Arc<tokio::sync::Mutex<HashMap<String, (String, tokio::time::Instant)>>>;
pub type CoordResult<T> = Result<T, error::CoordErrorResponse>;
pub type CompletionHook = Box<dyn FnOnce(crate::interfaces::tx::TxOutcome) -> futures::future::BoxFuture<'static, ()> + Send>;
