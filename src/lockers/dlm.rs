


/* ---------------------------------------------------------------
  ╰┈➤    distributed lock manager over the coordination store
   ---------------------------------------------------------------

    https://martin.kleppmann.com/2016/02/08/how-to-do-distributed-locking.html

    several instances of the service mutate the same business records, a
    shortlist edited from two nodes at once must be serialized across the
    whole cluster, a process mutex can't see the other nodes so the lock
    lives in the shared store:

    0 ▶ acquire: SET <prefix><key> <owner> NX PX <lease>, only one caller gets
        the record, the others poll until their wait budget runs out.
    1 ▶ the record value is the owner token `<node>:<uuid>` of the handle that
        took it, releasing compares it first so a caller whose lease already ran
        out can't delete a lock somebody else holds now.
    2 ▶ crashed holders never release, the lease (store side ttl) is the only
        thing bringing the key back, there's no renewal so the lease must be
        longer than the slowest run of the protected code.

    weakness: a holder paused longer than its lease (gc, network stall) keeps
    writing after another caller took over, there are no fencing tokens here.

    a DistLock handle is one owner, clones share the identity, caller() mints
    a new one on the same store, run-under-lock always goes through a fresh
    caller so concurrent invocations never share ownership.
*/

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;
use crate::config::CoordConfig;
use crate::consts::jittered_delay;
use crate::error::{LockError, StorageError};
use crate::interfaces::store::CoordStore;
use super::LockOptions;
use super::txguard::guarded;


#[derive(Clone)]
pub struct DistLock{
    store: Arc<dyn CoordStore>,
    node_id: String,
    owner: String,
    prefix: String,
    poll_interval: Duration,
    defaults: LockOptions,
}

impl DistLock{

    pub fn new(store: Arc<dyn CoordStore>, config: &CoordConfig) -> Self{
        Self{
            store,
            owner: format!("{}:{}", config.node_id, Uuid::new_v4()),
            node_id: config.node_id.clone(),
            prefix: config.lock_prefix.clone(),
            poll_interval: config.poll_interval,
            defaults: config.lock_defaults,
        }
    }

    /// a new lock owner on the same store and settings
    pub fn caller(&self) -> Self{
        Self{
            store: self.store.clone(),
            owner: format!("{}:{}", self.node_id, Uuid::new_v4()),
            node_id: self.node_id.clone(),
            prefix: self.prefix.clone(),
            poll_interval: self.poll_interval,
            defaults: self.defaults,
        }
    }

    // acts as an owner minted elsewhere, e.g. a token printed by an earlier cli run
    pub fn with_owner(&self, owner: &str) -> Self{
        Self{ owner: owner.to_string(), ..self.clone() }
    }

    pub fn owner(&self) -> &str{
        &self.owner
    }

    pub fn defaults(&self) -> LockOptions{
        self.defaults
    }

    fn record_key(&self, key: &str) -> String{
        format!("{}{}", self.prefix, key)
    }

    /// Tries to take `key` for `lease`, polling for up to `wait` while someone
    /// else holds it. A zero `wait` is a single attempt. Returns false on timeout
    /// and also when the store can't be reached.
    pub async fn try_lock(&self, key: &str, wait: Duration, lease: Duration) -> bool{
        self.try_lock_cancellable(key, wait, lease, std::future::pending::<()>()).await
    }

    pub async fn try_lock_with(&self, key: &str, opts: &LockOptions) -> bool{
        self.try_lock(key, opts.wait(), opts.lease()).await
    }

    /// Same as try_lock but gives up as soon as `cancel` completes, the waiting
    /// caller is treated as interrupted and never proceeds as if locked.
    pub async fn try_lock_cancellable<C>(&self, key: &str, wait: Duration, lease: Duration, cancel: C) -> bool
    where C: Future{

        if lease.is_zero(){
            log::error!("refusing to lock {} with a zero lease, it would never be honored", key);
            return false;
        }

        let record = self.record_key(key);

        // locks aren't reentrant, waiting on our own record would just burn the wait
        // budget and the cleanup on cancel below would delete a lock we rightfully hold
        match self.store.get(&record).await{
            Ok(Some(holder)) if holder == self.owner => {
                log::warn!("{} already holds {}, locks are not reentrant", self.owner, key);
                return false;
            },
            Ok(_) => {},
            Err(e) => {
                log::error!("coordination store failed while acquiring {}: {}", record, e);
                return false;
            }
        }

        tokio::select!{
            acquired = self.acquire(&record, wait, lease) => acquired,
            _ = cancel => {
                log::warn!("⚠️ waiting for lock {} got cancelled", key);
                // the SET may have landed right before we dropped the attempt
                if let Err(e) = self.store.del_if_eq(&record, &self.owner).await{
                    log::error!("failed to clean up lock {} after cancellation: {}", key, e);
                }
                false
            }
        }
    }

    async fn acquire(&self, record: &str, wait: Duration, lease: Duration) -> bool{

        // a wait too long to put on the clock never runs out
        let deadline = Instant::now().checked_add(wait);

        loop{

            match self.store.set_nx_px(record, &self.owner, lease).await{
                Ok(true) => {
                    log::debug!("🔒 {} acquired {} for {:?}", self.owner, record, lease);
                    return true;
                },
                Ok(false) => {},
                Err(e) => {
                    log::error!("coordination store failed while acquiring {}: {}", record, e);
                    return false;
                }
            }

            let remaining = match deadline{
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline{
                        log::debug!("gave up on {} after {:?}", record, wait);
                        return false;
                    }
                    deadline - now
                },
                None => Duration::MAX,
            };
            tokio::time::sleep(jittered_delay(self.poll_interval, remaining)).await;
        }
    }

    /// Releases `key` if this owner still holds it, otherwise does nothing.
    pub async fn unlock(&self, key: &str){
        let record = self.record_key(key);
        match self.store.del_if_eq(&record, &self.owner).await{
            Ok(true) => log::debug!("🔓 {} released {}", self.owner, record),
            Ok(false) => log::debug!("{} not held by {}, nothing to release", record, self.owner),
            Err(e) => log::error!("coordination store failed while releasing {}: {}, the lease will free it", record, e),
        }
    }

    // held by anyone
    pub async fn is_locked(&self, key: &str) -> Result<bool, StorageError>{
        self.store.exists(&self.record_key(key)).await
    }

    // held by this owner, false when the store can't tell
    pub async fn is_held(&self, key: &str) -> bool{
        match self.store.get(&self.record_key(key)).await{
            Ok(holder) => holder.as_deref() == Some(self.owner.as_str()),
            Err(e) => {
                log::error!("coordination store failed on ownership check of {}: {}", key, e);
                false
            }
        }
    }

    pub async fn holder(&self, key: &str) -> Result<Option<String>, StorageError>{
        self.store.get(&self.record_key(key)).await
    }

    /// remaining lease of the record, whoever holds it
    pub async fn lease_remaining(&self, key: &str) -> Option<Duration>{
        self.store.pttl(&self.record_key(key)).await.unwrap_or_else(|e|{
            log::error!("coordination store failed on lease lookup of {}: {}", key, e);
            None
        })
    }

    /// Runs `op` while holding `key` and releases it afterwards, whatever the
    /// outcome. Fails with `LockError::AcquisitionFailed` without running `op`
    /// when the key can't be taken in time; a panic in `op` is resumed once the
    /// lock is released, and dropping the returned future mid-run releases it
    /// in the background.
    pub async fn execute_with_lock<T, E, F, Fut>(&self, key: &str, wait: Duration, lease: Duration, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>
    {

        guarded(self, key, wait, lease, None, op).await
    }

}
