


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use crate::error::LockError;
use crate::lockers::{LockOptions, TimeUnit};
use super::support::{locker_on, FlakyStore, OpError};


#[tokio::test(start_paused = true)]
async fn concurrent_callers_never_overlap(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for _ in 0..8{
        let locker = locker.clone();
        let inside = inside.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move{
            locker.execute_with_lock("shortlist:0", Duration::from_secs(30), Duration::from_secs(5), || async{
                let now_inside = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now_inside, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), LockError>(())
            }).await
        }));
    }

    for handle in handles{
        handle.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(!locker.is_locked("shortlist:0").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn lease_frees_a_crashed_holder(){

    let locker = locker_on(FlakyStore::new());
    let crashed = locker.caller();
    assert!(crashed.try_lock("import:7", Duration::ZERO, Duration::from_secs(2)).await);

    let next = locker.caller();
    assert!(!next.try_lock("import:7", Duration::ZERO, Duration::from_secs(5)).await);

    // the crashed holder never unlocks, only its lease brings the key back
    let started = Instant::now();
    assert!(next.try_lock("import:7", Duration::from_secs(5), Duration::from_secs(5)).await);
    assert!(started.elapsed() <= Duration::from_secs(2) + Duration::from_millis(50));
    assert!(next.is_held("import:7").await);
    assert!(!crashed.is_held("import:7").await);
}

#[tokio::test(start_paused = true)]
async fn shortlist_contention_times_out_then_succeeds_after_unlock(){

    let locker = locker_on(FlakyStore::new());
    let first = locker.caller();
    let second = locker.caller();

    assert!(first.try_lock("shortlist:42", Duration::from_secs(2), Duration::from_secs(5)).await);

    let started = Instant::now();
    assert!(!second.try_lock("shortlist:42", Duration::from_secs(1), Duration::from_secs(5)).await);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1));
    assert!(waited < Duration::from_millis(1100));

    first.unlock("shortlist:42").await;
    let started = Instant::now();
    assert!(second.try_lock("shortlist:42", Duration::from_secs(1), Duration::from_secs(5)).await);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn unlock_is_idempotent_and_owner_scoped(){

    let locker = locker_on(FlakyStore::new());
    let holder = locker.caller();
    let stranger = locker.caller();

    // nothing held, nothing happens
    holder.unlock("role:3").await;

    assert!(holder.try_lock("role:3", Duration::ZERO, Duration::from_secs(30)).await);
    stranger.unlock("role:3").await;
    assert!(locker.is_locked("role:3").await.unwrap());

    holder.unlock("role:3").await;
    holder.unlock("role:3").await;
    assert!(!locker.is_locked("role:3").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn same_owner_does_not_reenter(){

    let locker = locker_on(FlakyStore::new());
    let caller = locker.caller();
    assert!(caller.try_lock("talent:1", Duration::ZERO, Duration::from_secs(30)).await);

    let started = Instant::now();
    assert!(!caller.try_lock("talent:1", Duration::from_secs(10), Duration::from_secs(30)).await);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(caller.is_held("talent:1").await);
}

#[tokio::test]
async fn zero_lease_is_refused(){
    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    assert!(!locker.try_lock("talent:2", Duration::ZERO, Duration::ZERO).await);
    assert_eq!(store.acquires(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_gives_up_without_the_lock(){

    let locker = locker_on(FlakyStore::new());
    let holder = locker.caller();
    let waiter = locker.caller();
    assert!(holder.try_lock("project:5", Duration::ZERO, Duration::from_secs(60)).await);

    let started = Instant::now();
    let acquired = waiter.try_lock_cancellable(
        "project:5",
        Duration::from_secs(30),
        Duration::from_secs(60),
        tokio::time::sleep(Duration::from_millis(100))
    ).await;

    assert!(!acquired);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!waiter.is_held("project:5").await);
    assert!(holder.is_held("project:5").await);
}

#[tokio::test]
async fn unreachable_store_fails_closed(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());
    store.set_down(true);

    assert!(!locker.try_lock("shortlist:1", Duration::from_secs(5), Duration::from_secs(5)).await);
    assert!(!locker.is_held("shortlist:1").await);
    assert!(locker.is_locked("shortlist:1").await.is_err());
    assert_eq!(locker.lease_remaining("shortlist:1").await, None);

    let ran = AtomicUsize::new(0);
    let res = locker.execute_with_lock("shortlist:1", Duration::ZERO, Duration::from_secs(5), || async{
        ran.fetch_add(1, Ordering::SeqCst);
        Ok::<(), OpError>(())
    }).await;

    assert!(matches!(res, Err(OpError::Lock(LockError::AcquisitionFailed{ .. }))));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn execute_with_lock_returns_operation_errors_and_releases(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());

    let res: Result<(), OpError> = locker.execute_with_lock("shortlist:9", Duration::ZERO, Duration::from_secs(5), || async{
        Err(OpError::Boom)
    }).await;

    assert!(matches!(res, Err(OpError::Boom)));
    assert!(!locker.is_locked("shortlist:9").await.unwrap());
    assert_eq!(store.releases(), 1);
}

#[tokio::test]
async fn busy_key_surfaces_as_acquisition_failure(){

    let locker = locker_on(FlakyStore::new());
    let holder = locker.caller();
    assert!(holder.try_lock("shortlist:10", Duration::ZERO, Duration::from_secs(30)).await);

    let res: Result<(), LockError> = locker.execute_with_lock("shortlist:10", Duration::ZERO, Duration::from_secs(5), || async{
        Ok(())
    }).await;

    match res{
        Err(e @ LockError::AcquisitionFailed{ .. }) => assert!(e.is_busy()),
        other => panic!("expected busy, got {:?}", other),
    }
}

#[tokio::test]
async fn panic_in_operation_still_releases(){

    let locker = locker_on(FlakyStore::new());
    let task_locker = locker.clone();

    let joined = tokio::spawn(async move{
        task_locker.execute_with_lock("shortlist:11", Duration::ZERO, Duration::from_secs(30), || async{
            if true{
                panic!("operation blew up");
            }
            Ok::<(), LockError>(())
        }).await
    }).await;

    assert!(joined.unwrap_err().is_panic());
    assert!(!locker.is_locked("shortlist:11").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn lease_remaining_counts_down(){

    let locker = locker_on(FlakyStore::new());
    assert_eq!(locker.lease_remaining("audition:1").await, None);

    assert!(locker.try_lock("audition:1", Duration::ZERO, Duration::from_secs(10)).await);
    tokio::time::advance(Duration::from_secs(4)).await;

    assert_eq!(locker.lease_remaining("audition:1").await, Some(Duration::from_secs(6)));
    assert_eq!(locker.holder("audition:1").await.unwrap().as_deref(), Some(locker.owner()));
}

#[tokio::test]
async fn cancelling_a_retake_keeps_the_held_lock(){

    let store = FlakyStore::new();
    let me = locker_on(store.clone()).caller();
    assert!(me.try_lock("talent:3", Duration::ZERO, Duration::from_secs(60)).await);

    // cancel is ready right away, it must not take our own lock down with it
    assert!(!me.try_lock_cancellable("talent:3", Duration::from_secs(5), Duration::from_secs(60), async{}).await);
    assert!(me.is_held("talent:3").await);
    assert_eq!(store.releases(), 0);
}

#[tokio::test(start_paused = true)]
async fn unbounded_wait_and_lease_stay_on_the_clock(){

    let locker = locker_on(FlakyStore::new());
    let holder = locker.caller();
    let waiter = locker.caller();

    assert!(holder.try_lock("talent:4", Duration::MAX, Duration::from_secs(5)).await);
    holder.unlock("talent:4").await;

    assert!(holder.try_lock("talent:4", Duration::ZERO, Duration::MAX).await);
    assert!(holder.lease_remaining("talent:4").await.is_some());

    // no deadline to run out, only the cancel ends the wait
    let gave_up = waiter.try_lock_cancellable(
        "talent:4",
        Duration::MAX,
        Duration::from_secs(5),
        tokio::time::sleep(Duration::from_millis(50))
    ).await;
    assert!(!gave_up);
    assert!(holder.is_held("talent:4").await);

    holder.unlock("talent:4").await;
    assert!(waiter.try_lock_with("talent:4", &LockOptions::new(u64::MAX, u64::MAX, TimeUnit::Hours)).await);
}

#[tokio::test(start_paused = true)]
async fn timed_out_execute_with_lock_releases_in_the_background(){

    let store = FlakyStore::new();
    let locker = locker_on(store.clone());

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        locker.execute_with_lock("shortlist:2", Duration::ZERO, Duration::from_secs(60), || async{
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<(), LockError>(())
        })
    ).await;
    assert!(timed_out.is_err());

    let mut released = false;
    for _ in 0..20{
        tokio::task::yield_now().await;
        if !locker.is_locked("shortlist:2").await.unwrap(){
            released = true;
            break;
        }
    }
    assert!(released);
    assert_eq!(store.releases(), 1);
}
