


/* ---------------------------------------------------------------
  ╰┈➤    shortlist mutations, one at a time per shortlist
   ---------------------------------------------------------------
    the shortlist rows themselves live in postgres behind the api layer,
    this is only the coordination around them: every mutation of a
    shortlist takes `shortlist:<id>` first so two instances editing the
    same shortlist are serialized, and when the mutation runs inside a
    transaction the lock stays held until that transaction is done.
*/

use serde::{Serialize, Deserialize};
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use crate::error::{CoordErrorResponse, KeyResolutionError, TxError};
use crate::interfaces::tx::TxSync;
use crate::lockers::dlm::DistLock;
use crate::lockers::keys::{ArgBindings, KeyTemplate};
use crate::lockers::txguard::Coordinated;
use crate::lockers::LockOptions;
use crate::storage::tx::SeaTx;
use crate::types::CoordResult;


pub const SHORTLIST_LOCK_TEMPLATE: &str = "shortlist:{shortlistId}";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShortlistUpdate{
    pub shortlist_id: i64,
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

type UpdateKey = fn(&ShortlistUpdate) -> Result<String, KeyResolutionError>;

fn update_key(update: &ShortlistUpdate) -> Result<String, KeyResolutionError>{
    Ok(format!("shortlist:{}", update.shortlist_id))
}

#[derive(Clone)]
pub struct ShortlistService{
    locker: DistLock,
    by_id: Coordinated<KeyTemplate>,
    by_update: Coordinated<UpdateKey>,
}

impl ShortlistService{

    pub fn new(locker: DistLock, opts: LockOptions) -> Result<Self, KeyResolutionError>{
        Ok(
            Self{
                locker,
                by_id: Coordinated::with_options(KeyTemplate::parse(SHORTLIST_LOCK_TEMPLATE)?, opts),
                by_update: Coordinated::with_options(update_key as UpdateKey, opts),
            }
        )
    }

    pub fn locker(&self) -> &DistLock{
        &self.locker
    }

    /// Runs `op` holding the lock of `shortlist_id`.
    pub async fn mutate<T, F, Fut>(&self, shortlist_id: i64, tx: Option<&dyn TxSync>, op: F) -> CoordResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = CoordResult<T>>
    {
        let bindings = ArgBindings::new().bind("shortlistId", shortlist_id);
        self.by_id.run(&self.locker, &bindings, tx, op).await
    }

    // same lock, keyed off the update payload itself
    pub async fn apply<T, F, Fut>(&self, update: &ShortlistUpdate, tx: Option<&dyn TxSync>, op: F) -> CoordResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = CoordResult<T>>
    {
        self.by_update.run(&self.locker, update, tx, op).await
    }

    /// Bumps the shortlist revision inside `tx`, the lock is released once
    /// `tx` commits or rolls back.
    pub async fn bump_revision(&self, tx: &SeaTx, shortlist_id: i64) -> CoordResult<u64>{
        self.mutate(shortlist_id, Some(tx as &dyn TxSync), || async move{
            let conn = tx.conn().ok_or(TxError::Completed)?;
            let res = conn.execute(
                Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "UPDATE shortlists SET revision = revision + 1, updated_at = now() WHERE id = $1",
                    [shortlist_id.into()]
                )
            ).await?;
            Ok::<_, CoordErrorResponse>(res.rows_affected())
        }).await
    }

}
