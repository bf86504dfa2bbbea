


use std::time::Duration;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use crate::error::{CoordErrorResponse, KeyResolutionError, LockError};
use crate::interfaces::tx::{TxOutcome, TxSync};
use crate::lockers::keys::{key_fn, ArgBindings, KeyTemplate};
use crate::lockers::txguard::{with_lock, Coordinated, ReleaseGuard};
use crate::lockers::dlm::DistLock;
use crate::lockers::{LockOptions, TimeUnit};
use crate::services::shortlist::{ShortlistService, ShortlistUpdate};
use crate::storage::tx::{SeaTx, TxHooks};
use super::support::{locker_on, FlakyStore, OpError};


fn no_wait() -> LockOptions{
    LockOptions::new(0, 30, TimeUnit::Seconds)
}

#[tokio::test]
async fn releases_right_away_without_a_transaction(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());

    let out: Result<u32, LockError> = with_lock(&locker, "shortlist:1", &no_wait(), None, || async{
        Ok(7)
    }).await;

    assert_eq!(out.unwrap(), 7);
    assert!(!locker.is_locked("shortlist:1").await.unwrap());
    assert_eq!(store.releases(), 1);
}

#[tokio::test]
async fn release_waits_for_commit_inside_a_transaction(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    let tx = TxHooks::new();

    let out: Result<(), LockError> = with_lock(&locker, "shortlist:2", &no_wait(), Some(&tx as &dyn TxSync), || async{
        Ok(())
    }).await;
    out.unwrap();

    // uncommitted writes stay protected
    assert!(locker.is_locked("shortlist:2").await.unwrap());
    assert_eq!(tx.pending(), 1);
    assert_eq!(store.releases(), 0);
    let contender: Result<(), LockError> = with_lock(&locker, "shortlist:2", &no_wait(), None, || async{ Ok(()) }).await;
    assert!(contender.unwrap_err().is_busy());

    tx.complete(TxOutcome::Committed).await;
    assert!(!locker.is_locked("shortlist:2").await.unwrap());
    assert_eq!(store.releases(), 1);

    let contender: Result<(), LockError> = with_lock(&locker, "shortlist:2", &no_wait(), None, || async{ Ok(()) }).await;
    assert!(contender.is_ok());
}

#[tokio::test]
async fn failed_operation_is_released_once_on_rollback(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    let tx = TxHooks::new();

    let out: Result<(), OpError> = with_lock(&locker, "shortlist:3", &no_wait(), Some(&tx as &dyn TxSync), || async{
        Err(OpError::Boom)
    }).await;
    assert!(matches!(out, Err(OpError::Boom)));
    assert!(locker.is_locked("shortlist:3").await.unwrap());

    tx.complete(TxOutcome::RolledBack).await;
    tx.complete(TxOutcome::RolledBack).await;
    assert!(!locker.is_locked("shortlist:3").await.unwrap());
    assert_eq!(store.releases(), 1);
}

#[tokio::test]
async fn completed_transaction_falls_back_to_immediate_release(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    let tx = TxHooks::new();
    tx.complete(TxOutcome::Committed).await;
    assert!(!tx.is_active());

    let out: Result<(), LockError> = with_lock(&locker, "shortlist:4", &no_wait(), Some(&tx as &dyn TxSync), || async{ Ok(()) }).await;
    out.unwrap();
    assert!(!locker.is_locked("shortlist:4").await.unwrap());
    assert_eq!(store.releases(), 1);
}

#[tokio::test]
async fn release_guard_fires_once(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    assert!(locker.try_lock("shortlist:5", Duration::ZERO, Duration::from_secs(30)).await);

    let guard = ReleaseGuard::new(locker.clone(), "shortlist:5");
    assert!(guard.release().await);
    assert!(!guard.release().await);
    assert!(guard.is_released());
    assert_eq!(store.releases(), 1);
}

#[tokio::test]
async fn unresolvable_key_never_reaches_the_store(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    let point = Coordinated::new(KeyTemplate::parse("shortlist:{shortlistId}").unwrap());

    let out: Result<(), LockError> = point.run(&locker, &ArgBindings::new().bind("id", 1), None, || async{ Ok(()) }).await;

    assert!(matches!(out, Err(LockError::KeyResolution(KeyResolutionError::Unbound{ .. }))));
    assert_eq!(store.acquires(), 0);
}

#[tokio::test]
async fn declared_point_locks_the_resolved_key(){

    let locker = locker_on(FlakyStore::new());
    let point = Coordinated::new(key_fn(|u: &ShortlistUpdate| Ok(format!("shortlist:{}", u.shortlist_id))))
        .wait(0)
        .lease(5);
    assert_eq!(point.options(), Some(LockOptions::new(0, 5, TimeUnit::Seconds)));

    let update = ShortlistUpdate{ shortlist_id: 7, added: vec![1, 2], removed: vec![] };
    let seen = point.run(&locker, &update, None, || async{
        Ok::<bool, LockError>(locker.is_locked("shortlist:7").await.unwrap_or(false))
    }).await.unwrap();

    assert!(seen);
    assert!(!locker.is_locked("shortlist:7").await.unwrap());
}

#[tokio::test]
async fn busy_shortlist_maps_to_resource_busy(){

    let locker = locker_on(FlakyStore::new());
    let service = ShortlistService::new(locker.clone(), no_wait()).unwrap();
    let holder = locker.caller();
    assert!(holder.try_lock("shortlist:8", Duration::ZERO, Duration::from_secs(30)).await);

    let err = service.mutate(8, None, || async{ Ok(()) }).await.unwrap_err();
    assert!(err.is_busy());
    assert_eq!(err.status(), 423);

    holder.unlock("shortlist:8").await;
    let update = ShortlistUpdate{ shortlist_id: 8, ..Default::default() };
    let applied: Result<(), CoordErrorResponse> = service.apply(&update, None, || async{ Ok(()) }).await;
    assert!(applied.is_ok());
}

#[tokio::test]
async fn sea_tx_commit_releases_after_the_writes_land(){

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult{ last_insert_id: 0, rows_affected: 1 }])
        .into_connection();
    let locker = locker_on(FlakyStore::new());
    let service = ShortlistService::new(locker.clone(), no_wait()).unwrap();

    let tx = SeaTx::begin(&db).await.unwrap();
    let rows = service.bump_revision(&tx, 42).await.unwrap();
    assert_eq!(rows, 1);
    assert!(locker.is_locked("shortlist:42").await.unwrap());

    tx.commit().await.unwrap();
    assert!(!locker.is_locked("shortlist:42").await.unwrap());
}

#[tokio::test]
async fn sea_tx_rollback_releases(){

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult{ last_insert_id: 0, rows_affected: 1 }])
        .into_connection();
    let locker = locker_on(FlakyStore::new());
    let service = ShortlistService::new(locker.clone(), no_wait()).unwrap();

    let tx = SeaTx::begin(&db).await.unwrap();
    service.bump_revision(&tx, 43).await.unwrap();
    tx.rollback().await.unwrap();
    assert!(!locker.is_locked("shortlist:43").await.unwrap());
}

#[tokio::test]
async fn dropped_sea_tx_releases_as_rolled_back(){

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult{ last_insert_id: 0, rows_affected: 1 }])
        .into_connection();
    let locker = locker_on(FlakyStore::new());
    let service = ShortlistService::new(locker.clone(), no_wait()).unwrap();

    {
        let tx = SeaTx::begin(&db).await.unwrap();
        service.bump_revision(&tx, 44).await.unwrap();
        assert!(tx.is_active());
    }

    // the hooks run on a spawned task
    assert!(wait_until_unlocked(&locker, "shortlist:44").await);
}

#[tokio::test]
async fn panic_inside_a_transaction_keeps_the_lock_until_completion(){

    let locker = locker_on(FlakyStore::new());
    let tx = std::sync::Arc::new(TxHooks::new());

    let task_locker = locker.clone();
    let task_tx = tx.clone();
    let joined = tokio::spawn(async move{
        with_lock(&task_locker, "shortlist:45", &no_wait(), Some(task_tx.as_ref() as &dyn TxSync), || async{
            if true{
                panic!("mutation blew up");
            }
            Ok::<(), LockError>(())
        }).await
    }).await;

    assert!(joined.unwrap_err().is_panic());
    assert!(locker.is_locked("shortlist:45").await.unwrap());

    tx.complete(TxOutcome::RolledBack).await;
    assert!(!locker.is_locked("shortlist:45").await.unwrap());
}

async fn wait_until_unlocked(locker: &DistLock, key: &str) -> bool{
    for _ in 0..20{
        tokio::task::yield_now().await;
        if !locker.is_locked(key).await.unwrap(){
            return true;
        }
    }
    false
}

#[tokio::test(start_paused = true)]
async fn timed_out_operation_releases_in_the_background(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        with_lock(&locker, "shortlist:46", &no_wait(), None, || async{
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<(), LockError>(())
        })
    ).await;
    assert!(timed_out.is_err());

    assert!(wait_until_unlocked(&locker, "shortlist:46").await);
    assert_eq!(store.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_operation_in_a_transaction_waits_for_completion(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    let tx = TxHooks::new();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        with_lock(&locker, "shortlist:47", &no_wait(), Some(&tx as &dyn TxSync), || async{
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<(), LockError>(())
        })
    ).await;
    assert!(timed_out.is_err());

    // the hook still owns the release
    for _ in 0..5{
        tokio::task::yield_now().await;
    }
    assert!(locker.is_locked("shortlist:47").await.unwrap());
    assert_eq!(tx.pending(), 1);

    tx.complete(TxOutcome::RolledBack).await;
    assert!(!locker.is_locked("shortlist:47").await.unwrap());
    assert_eq!(store.releases(), 1);
}

#[tokio::test]
async fn dropped_release_guard_releases_in_the_background(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    assert!(locker.try_lock("shortlist:48", Duration::ZERO, Duration::from_secs(30)).await);

    drop(ReleaseGuard::new(locker.clone(), "shortlist:48"));
    assert!(wait_until_unlocked(&locker, "shortlist:48").await);
    assert_eq!(store.releases(), 1);
}
