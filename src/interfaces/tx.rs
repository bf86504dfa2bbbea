


use crate::error::TxError;
use crate::types::CompletionHook;


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxOutcome{
    Committed,
    RolledBack,
}

/* -----------------
    the ambient transaction boundary as the coordination layer sees it, it can
    ask whether a transaction is running and hand over a hook to be fired once
    the outcome (commit or rollback) is final, it never begins, commits or rolls
    back anything itself, whoever owns the transaction does that.
    a hook must be fired exactly once per registration.
*/
pub trait TxSync: Send + Sync{
    fn is_active(&self) -> bool;
    fn register_completion(&self, hook: CompletionHook) -> Result<(), TxError>;
}
