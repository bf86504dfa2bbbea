


/* ---------------------------------------------------------------
  ╰┈➤    in memory coordination store
   ---------------------------------------------------------------
    a single process stand-in for redis, same atomic primitives guarded
    by one tokio mutex, expiry is lazy: every access drops records whose
    deadline is behind tokio's clock, so a paused test clock drives it.
    it only coordinates tasks inside this process, use redis for a cluster.
*/

use std::collections::HashMap;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::Instant;
use crate::consts::FAR_FUTURE;
use crate::error::StorageError;
use crate::interfaces::store::CoordStore;
use crate::types::RamDb;


#[derive(Clone, Default)]
pub struct RamStore{
    ramdb: RamDb,
}

impl RamStore{

    pub fn new() -> Self{
        Self{
            ramdb: std::sync::Arc::new(
                tokio::sync::Mutex::new(
                    HashMap::new()
                )
            )
        }
    }
}

// a ttl too long for the clock stays put for a century
pub(crate) fn deadline_after(ttl: Duration) -> Instant{
    let now = Instant::now();
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

fn live<'m>(map: &'m mut HashMap<String, (String, Instant)>, key: &str) -> Option<&'m (String, Instant)>{
    let expired = matches!(map.get(key), Some((_, deadline)) if *deadline <= Instant::now());
    if expired{
        map.remove(key);
    }
    map.get(key)
}

#[async_trait]
impl CoordStore for RamStore{

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StorageError> {
        let mut map = self.ramdb.lock().await;
        if live(&mut map, key).is_some(){
            return Ok(false);
        }
        map.insert(key.to_string(), (value.to_string(), deadline_after(ttl)));
        Ok(true)
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let mut map = self.ramdb.lock().await;
        map.insert(key.to_string(), (value.to_string(), deadline_after(ttl)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut map = self.ramdb.lock().await;
        Ok(live(&mut map, key).map(|(v, _)| v.clone()))
    }

    async fn del_if_eq(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        let mut map = self.ramdb.lock().await;
        let owned = matches!(live(&mut map, key), Some((v, _)) if v == value);
        if owned{
            map.remove(key);
        }
        Ok(owned)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut map = self.ramdb.lock().await;
        Ok(live(&mut map, key).is_some())
    }

    async fn pttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        let mut map = self.ramdb.lock().await;
        Ok(live(&mut map, key).map(|(_, deadline)| deadline.saturating_duration_since(Instant::now())))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
