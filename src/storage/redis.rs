


/* ---------------------------------------------------------------
  ╰┈➤    redis coordination store
   ---------------------------------------------------------------
    SET NX PX is the only thing giving us mutual exclusion across nodes,
    release goes through a lua script so the compare (is it still ours?)
    and the delete happen atomically on the redis side, a plain GET then
    DEL would let us drop a lock someone else picked up after our lease
    ran out.

    https://redis.io/docs/latest/develop/use/patterns/distributed-locks/
*/

use std::time::Duration;
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use once_cell::sync::Lazy;
use crate::consts::FAR_FUTURE;
use crate::error::StorageError;
use crate::interfaces::store::CoordStore;
use crate::types::RedisPoolConnection;


static COMPARE_AND_DELETE: Lazy<redis::Script> = Lazy::new(||{
    redis::Script::new(r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
            return redis.call("DEL", KEYS[1])
        else
            return 0
        end
    "#)
});

// redis refuses PX 0, a sub millisecond ttl rounds up to 1ms, anything past
// FAR_FUTURE is capped there
pub(crate) fn ttl_millis(ttl: Duration) -> u64{
    let millis = ttl.min(FAR_FUTURE).as_millis();
    std::cmp::max(u64::try_from(millis).unwrap_or(u64::MAX), 1)
}

// SET NX replies OK when it wrote the key, nil when the key was already there
pub(crate) fn set_nx_acquired(reply: Option<String>) -> bool{
    reply.is_some()
}

// PTTL replies -2 when the key is gone and -1 when it has no expiry
pub(crate) fn pttl_to_duration(millis: i64) -> Option<Duration>{
    u64::try_from(millis).ok().map(Duration::from_millis)
}

#[derive(Clone)]
pub struct RedisStore{
    pool: std::sync::Arc<RedisPoolConnection>,
}

impl RedisStore{

    pub fn new(pool: std::sync::Arc<RedisPoolConnection>) -> Self{
        Self{ pool }
    }

    pub fn from_url(redis_url: &str) -> Result<Self, StorageError>{
        let cfg = deadpool_redis::Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
        Ok(Self::new(std::sync::Arc::new(pool)))
    }
}

#[async_trait]
impl CoordStore for RedisStore{

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut redis_conn)
            .await?;
        Ok(set_nx_acquired(reply))
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut redis_conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let value: Option<String> = redis_conn.get(key).await?;
        Ok(value)
    }

    async fn del_if_eq(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let deleted: i64 = COMPARE_AND_DELETE
            .key(key)
            .arg(value)
            .invoke_async(&mut redis_conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let is_key_there: bool = redis_conn.exists(key).await?;
        Ok(is_key_there)
    }

    async fn pttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut redis_conn)
            .await?;
        Ok(pttl_to_duration(millis))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut redis_conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut redis_conn).await?;
        Ok(())
    }
}
