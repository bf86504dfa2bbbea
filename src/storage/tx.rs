


/* ---------------------------------------------------------------
  ╰┈➤    transaction boundaries with completion hooks
   ---------------------------------------------------------------
    seaorm has no after-commit callbacks so SeaTx wraps a DatabaseTransaction
    and keeps its own hook registry, hooks fire once the outcome is final:
        - commit() ok      ▶ Committed
        - commit() failed  ▶ RolledBack (the database dropped the writes)
        - rollback()       ▶ RolledBack
        - dropped unfinished ▶ seaorm rolls back on drop, hooks fire as RolledBack
                               on the current tokio runtime
    TxHooks is the registry itself, usable on its own by code that manages
    its transaction some other way.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use crate::error::TxError;
use crate::interfaces::tx::{TxOutcome, TxSync};
use crate::types::CompletionHook;


#[derive(Default)]
pub struct TxHooks{
    completed: AtomicBool,
    hooks: std::sync::Mutex<Vec<CompletionHook>>,
}

impl TxHooks{

    pub fn new() -> Self{
        Self::default()
    }

    pub fn pending(&self) -> usize{
        self.hooks.lock().map(|h| h.len()).unwrap_or(0)
    }

    // closes the registry and hands back what was registered, only the first call gets them
    fn drain(&self) -> Vec<CompletionHook>{
        self.completed.store(true, Ordering::SeqCst);
        match self.hooks.lock(){
            Ok(mut hooks) => std::mem::take(&mut *hooks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// fires every registered hook with the outcome, in registration order
    pub async fn complete(&self, outcome: TxOutcome){
        let hooks = self.drain();
        if !hooks.is_empty(){
            log::debug!("firing {} completion hook(s) after {:?}", hooks.len(), outcome);
        }
        for hook in hooks{
            hook(outcome).await;
        }
    }
}

impl TxSync for TxHooks{

    fn is_active(&self) -> bool{
        !self.completed.load(Ordering::SeqCst)
    }

    fn register_completion(&self, hook: CompletionHook) -> Result<(), TxError>{
        let mut hooks = match self.hooks.lock(){
            Ok(hooks) => hooks,
            Err(poisoned) => poisoned.into_inner(),
        };
        // checked under the lock so a hook can't slip in after drain()
        if self.completed.load(Ordering::SeqCst){
            return Err(TxError::Completed);
        }
        hooks.push(hook);
        Ok(())
    }
}


pub struct SeaTx{
    inner: Option<DatabaseTransaction>,
    hooks: TxHooks,
}

impl SeaTx{

    pub async fn begin(db: &DatabaseConnection) -> Result<Self, DbErr>{
        let txn = db.begin().await?;
        Ok(Self{ inner: Some(txn), hooks: TxHooks::new() })
    }

    /// the underlying transaction to run queries on, None once finished
    pub fn conn(&self) -> Option<&DatabaseTransaction>{
        self.inner.as_ref()
    }

    pub async fn commit(mut self) -> Result<(), DbErr>{
        let res = match self.inner.take(){
            Some(txn) => txn.commit().await,
            None => Ok(()),
        };
        let outcome = if res.is_ok(){ TxOutcome::Committed } else{ TxOutcome::RolledBack };
        self.hooks.complete(outcome).await;
        res
    }

    pub async fn rollback(mut self) -> Result<(), DbErr>{
        let res = match self.inner.take(){
            Some(txn) => txn.rollback().await,
            None => Ok(()),
        };
        self.hooks.complete(TxOutcome::RolledBack).await;
        res
    }
}

impl TxSync for SeaTx{

    fn is_active(&self) -> bool{
        self.inner.is_some() && self.hooks.is_active()
    }

    fn register_completion(&self, hook: CompletionHook) -> Result<(), TxError>{
        if self.inner.is_none(){
            return Err(TxError::Completed);
        }
        self.hooks.register_completion(hook)
    }
}

impl Drop for SeaTx{
    fn drop(&mut self){
        if !self.hooks.is_active(){
            return;
        }
        let hooks = self.hooks.drain();
        if hooks.is_empty(){
            return;
        }
        // the DatabaseTransaction field rolls itself back when it drops right after this
        match tokio::runtime::Handle::try_current(){
            Ok(handle) => {
                log::warn!("transaction dropped without commit or rollback, firing {} hook(s) as rolled back", hooks.len());
                handle.spawn(async move{
                    for hook in hooks{
                        hook(TxOutcome::RolledBack).await;
                    }
                });
            },
            Err(_) => {
                log::error!("transaction dropped outside a tokio runtime, {} completion hook(s) lost, their locks fall back to lease expiry", hooks.len());
            }
        }
    }
}
