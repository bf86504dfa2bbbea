


use std::time::Duration;
use async_trait::async_trait;
use crate::error::StorageError;


/* -----------------
    the shared coordination store every instance of the service talks to, only
    atomic primitives live here so neither the lock manager nor the rate limiter
    ever does read-then-write against it for mutual exclusion.
    async_trait is used instead of plain async methods so the store can sit
    behind an Arc<dyn CoordStore> and be picked at runtime (redis or in memory).
*/
#[async_trait]
pub trait CoordStore: Send + Sync{

    /// atomic set-if-absent with a ttl, true if this call created the record
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StorageError>;

    /// unconditional set with a ttl, overwrites whatever was there
    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// atomic compare-and-delete, true if the record held `value` and got removed
    async fn del_if_eq(&self, key: &str, value: &str) -> Result<bool, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// remaining ttl, None if the key is absent or has no expiry
    async fn pttl(&self, key: &str) -> Result<Option<Duration>, StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;
}
