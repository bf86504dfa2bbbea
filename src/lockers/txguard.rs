


/* ---------------------------------------------------------------
  ╰┈➤    transaction aware lock interceptor
   ---------------------------------------------------------------
    wraps a caller operation so it only runs while its key is held:

        resolve key ──▶ try lock ──▶ run op ──▶ release
             │              │                      ▲
             ▼              ▼                      │
        key error      busy error     now, or once the ambient tx
                                      commits or rolls back

    inside a running transaction the release is deferred to the tx completion
    hook, releasing right after the op returns would let the next caller in
    before our writes are committed and it'd read the old state.
    the ReleaseGuard flag makes sure exactly one release goes out whichever
    path gets there first, a guard dropped before anyone released it (the
    caller's future got timed out or cancelled mid op) releases in the
    background on the current runtime.
*/

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use futures::FutureExt;
use crate::error::LockError;
use crate::interfaces::tx::TxSync;
use crate::types::CompletionHook;
use super::dlm::DistLock;
use super::keys::KeyResolver;
use super::{LockOptions, TimeUnit};


pub struct ReleaseGuard{
    released: AtomicBool,
    locker: DistLock,
    key: String,
}

impl ReleaseGuard{

    pub fn new(locker: DistLock, key: &str) -> Self{
        Self{
            released: AtomicBool::new(false),
            locker,
            key: key.to_string(),
        }
    }

    /// releases the lock on the first call, true if this call did it
    pub async fn release(&self) -> bool{
        if self.released.swap(true, Ordering::SeqCst){
            return false;
        }
        self.locker.unlock(&self.key).await;
        true
    }

    pub fn is_released(&self) -> bool{
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for ReleaseGuard{
    fn drop(&mut self){
        if self.released.swap(true, Ordering::SeqCst){
            return;
        }
        let locker = self.locker.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current(){
            Ok(handle) => {
                log::warn!("⚠️ lock on {} dropped before its release, releasing in the background", key);
                handle.spawn(async move{
                    locker.unlock(&key).await;
                });
            },
            Err(_) => {
                log::error!("lock on {} dropped outside a tokio runtime, the lease will free it", key);
            }
        }
    }
}


/* -----------------
    a declared coordination point, how to get the key out of the call
    arguments and how long to wait and hold it, declare it once next to the
    operation and run every invocation through it:

        let update = Coordinated::new(KeyTemplate::parse("shortlist:{shortlistId}")?)
            .wait(5)
            .lease(10);
        update.run(&locker, &bindings, Some(&tx), || async{ ... }).await?;
*/
#[derive(Clone, Debug)]
pub struct Coordinated<R>{
    resolver: R,
    opts: Option<LockOptions>,
}

impl<R> Coordinated<R>{

    pub fn new(resolver: R) -> Self{
        Self{ resolver, opts: None }
    }

    pub fn with_options(resolver: R, opts: LockOptions) -> Self{
        Self{ resolver, opts: Some(opts) }
    }

    pub fn wait(mut self, wait_time: u64) -> Self{
        self.opts.get_or_insert_with(LockOptions::default).wait_time = wait_time;
        self
    }

    pub fn lease(mut self, lease_time: u64) -> Self{
        self.opts.get_or_insert_with(LockOptions::default).lease_time = lease_time;
        self
    }

    pub fn unit(mut self, unit: TimeUnit) -> Self{
        self.opts.get_or_insert_with(LockOptions::default).unit = unit;
        self
    }

    // what this point declared, None means the locker's configured defaults
    pub fn options(&self) -> Option<LockOptions>{
        self.opts
    }

    pub async fn run<A, T, E, F, Fut>(&self, locker: &DistLock, args: &A, tx: Option<&dyn TxSync>, op: F) -> Result<T, E>
    where
        A: ?Sized,
        R: KeyResolver<A>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>
    {
        // a key that can't be resolved never reaches the store
        let key = self.resolver
            .resolve(args)
            .map_err(|e| E::from(LockError::from(e)))?;
        let opts = self.opts.unwrap_or_else(|| locker.defaults());
        with_lock(locker, &key, &opts, tx, op).await
    }
}


/// Runs `op` under the lock on `key`. Inside an active `tx` the release is
/// handed to the transaction's completion hook, otherwise it happens right
/// after `op` returns. Errors of `op` come back untouched.
pub async fn with_lock<T, E, F, Fut>(locker: &DistLock, key: &str, opts: &LockOptions, tx: Option<&dyn TxSync>, op: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>
{
    guarded(locker, key, opts.wait(), opts.lease(), tx, op).await
}

pub(crate) async fn guarded<T, E, F, Fut>(locker: &DistLock, key: &str, wait: Duration, lease: Duration, tx: Option<&dyn TxSync>, op: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>
{

    let caller = locker.caller();
    if !caller.try_lock(key, wait, lease).await{
        log::info!("🔒 {} is busy, gave up after {:?}", key, wait);
        return Err(E::from(LockError::AcquisitionFailed{ key: key.to_string(), waited: wait }));
    }

    let guard = Arc::new(ReleaseGuard::new(caller, key));

    let deferred = match tx{
        Some(tx) if tx.is_active() => {
            let hook_guard = guard.clone();
            let hook: CompletionHook = Box::new(move |outcome|{
                async move{
                    log::debug!("transaction {:?}, releasing {}", outcome, hook_guard.key);
                    hook_guard.release().await;
                }.boxed()
            });
            match tx.register_completion(hook){
                Ok(()) => true,
                Err(e) => {
                    log::warn!("couldn't defer release of {} to the transaction ({}), releasing right after the operation", key, e);
                    false
                }
            }
        },
        _ => false,
    };

    let outcome = AssertUnwindSafe(async move{ op().await }).catch_unwind().await;

    if !deferred{
        guard.release().await;
    }

    match outcome{
        Ok(res) => res,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
