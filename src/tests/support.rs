


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use crate::config::CoordConfig;
use crate::error::{LockError, StorageError};
use crate::interfaces::store::CoordStore;
use crate::lockers::dlm::DistLock;
use crate::storage::ramdb::RamStore;


// a ram store that can be switched off and counts the calls we care about
#[derive(Default)]
pub struct FlakyStore{
    inner: RamStore,
    down: AtomicBool,
    acquires: AtomicUsize,
    releases: AtomicUsize,
}

impl FlakyStore{

    pub fn new() -> Arc<Self>{
        Arc::new(Self{ inner: RamStore::new(), ..Default::default() })
    }

    pub fn set_down(&self, down: bool){
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn acquires(&self) -> usize{
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize{
        self.releases.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StorageError>{
        if self.down.load(Ordering::SeqCst){
            return Err(StorageError::Unavailable(String::from("connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordStore for FlakyStore{

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StorageError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set_nx_px(key, value, ttl).await
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set_px(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn del_if_eq(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.del_if_eq(key, value).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn pttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        self.check()?;
        self.inner.pttl(key).await
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }
}

pub fn test_config() -> CoordConfig{
    CoordConfig{
        node_id: String::from("test-node"),
        poll_interval: Duration::from_millis(10),
        ..CoordConfig::default()
    }
}

pub fn locker_on(store: Arc<FlakyStore>) -> DistLock{
    DistLock::new(store, &test_config())
}

#[derive(Debug)]
pub enum OpError{
    Lock(LockError),
    Boom,
}

impl From<LockError> for OpError{
    fn from(e: LockError) -> Self{
        OpError::Lock(e)
    }
}
