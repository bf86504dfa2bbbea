


use std::time::Duration;
use clap::{Parser, Subcommand};
use crate::appstate::AppState;
use crate::error::LockError;
use crate::interfaces::mail::LogMailer;
use crate::interfaces::tx::{TxOutcome, TxSync};
use crate::limiters::mail::{MailTemplate, Throttled};
use crate::lockers::{LockOptions, TimeUnit};
use crate::services::notify::NotifyService;
use crate::services::shortlist::ShortlistService;
use crate::storage::tx::{SeaTx, TxHooks};
use crate::types::CoordResult;


#[derive(Parser, Debug)]
#[command(name = "castkeeper")]
#[command(about = "Distributed locks and rate limits over a shared coordination store")]
pub struct Cli{
    #[command(subcommand)]
    pub command: Commands,
    /// overrides STORE_ENGINE, redis or ram
    #[arg(long)]
    pub store: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands{
    /// Try to take a lock and print the owner token
    Lock{
        key: String,
        #[arg(long)]
        wait: Option<u64>,
        #[arg(long)]
        lease: Option<u64>,
        /// ms, s, m or h
        #[arg(long)]
        unit: Option<TimeUnit>,
    },
    /// Release a lock taken by an earlier `lock`
    Unlock{
        key: String,
        /// owner token printed by `lock`
        #[arg(long)]
        owner: String,
    },
    /// Show who holds a lock and for how long
    Status{
        key: String,
    },
    /// Start a rate limit window on a key
    Limit{
        key: String,
        /// window in seconds, RATE_LIMIT_WINDOW_SECS when absent
        #[arg(long)]
        window: Option<u64>,
    },
    /// Check whether a key is rate limited
    Check{
        key: String,
    },
    /// Send a templated mail through the throttle
    Mail{
        recipient: String,
        template: MailTemplate,
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Bump a shortlist revision in postgres under its lock, needs DATABASE_URL
    Bump{
        shortlist_id: i64,
    },
    /// Walk through lock contention and mail throttling on the configured store
    Demo,
}

pub async fn exec(command: Commands, app_state: &AppState) -> CoordResult<()>{

    match command{
        Commands::Lock{ key, wait, lease, unit } => {
            let defaults = app_state.locker.defaults();
            let opts = LockOptions::new(
                wait.unwrap_or(defaults.wait_time),
                lease.unwrap_or(defaults.lease_time),
                unit.unwrap_or(defaults.unit),
            );
            let caller = app_state.locker.caller();
            if !caller.try_lock_with(&key, &opts).await{
                return Err(LockError::AcquisitionFailed{ key, waited: opts.wait() }.into());
            }
            println!("{}", serde_json::json!({
                "key": key,
                "owner": caller.owner(),
                "lease": format!("{:?}", opts.lease()),
            }));
        },
        Commands::Unlock{ key, owner } => {
            let caller = app_state.locker.with_owner(&owner);
            let held = caller.is_held(&key).await;
            caller.unlock(&key).await;
            println!("{}", serde_json::json!({ "key": key, "released": held }));
        },
        Commands::Status{ key } => {
            let locked = app_state.locker.is_locked(&key).await?;
            let holder = app_state.locker.holder(&key).await?;
            let remaining = app_state.locker.lease_remaining(&key).await;
            println!("{}", serde_json::json!({
                "key": key,
                "locked": locked,
                "holder": holder,
                "leaseRemainingMs": remaining.map(|d| d.as_millis() as u64),
            }));
        },
        Commands::Limit{ key, window } => {
            app_state.limiter.set_limit(&key, window.map(Duration::from_secs)).await?;
            let remaining = app_state.limiter.remaining_time(&key).await;
            println!("{}", serde_json::json!({ "key": key, "remainingMs": remaining.as_millis() as u64 }));
        },
        Commands::Check{ key } => {
            let limited = app_state.limiter.is_limited(&key).await;
            let remaining = app_state.limiter.remaining_time(&key).await;
            let since = app_state.limiter.limited_since(&key).await;
            println!("{}", serde_json::json!({
                "key": key,
                "limited": limited,
                "remainingMs": remaining.as_millis() as u64,
                "since": since.map(|t| t.to_rfc3339()),
            }));
        },
        Commands::Mail{ recipient, template, payload } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let notifier = NotifyService::new(app_state.mail_throttle.clone(), LogMailer);
            let res = notifier.notify(&recipient, template.clone(), payload).await?;
            print_throttled(&recipient, &template, &res);
        },
        Commands::Bump{ shortlist_id } => {
            let db = app_state.app_storage.get_seaorm_pool()?;
            let shortlists = ShortlistService::new(app_state.locker.clone(), app_state.locker.defaults())?;
            let tx = SeaTx::begin(db).await?;
            let rows = shortlists.bump_revision(&tx, shortlist_id).await?;
            // the lock is released by the commit hook, after the write is visible
            tx.commit().await?;
            println!("{}", serde_json::json!({ "shortlistId": shortlist_id, "rowsAffected": rows }));
        },
        Commands::Demo => demo(app_state).await?,
    }

    Ok(())

}

fn print_throttled(recipient: &str, template: &MailTemplate, res: &Throttled<()>){
    let (sent, retry_in) = match res{
        Throttled::Sent(_) => (true, None),
        Throttled::Suppressed{ retry_in } => (false, Some(retry_in.as_millis() as u64)),
    };
    println!("{}", serde_json::json!({
        "recipient": recipient,
        "template": template.to_string(),
        "sent": sent,
        "retryInMs": retry_in,
    }));
}

async fn demo(app_state: &AppState) -> CoordResult<()>{

    let holder = ShortlistService::new(app_state.locker.clone(), LockOptions::new(2, 5, TimeUnit::Seconds))?;
    let contender = ShortlistService::new(app_state.locker.clone(), LockOptions::new(1, 5, TimeUnit::Seconds))?;

    // the first mutation runs inside a transaction that stays open for a while
    let tx = TxHooks::new();
    holder.mutate(42, Some(&tx as &dyn TxSync), || async{
        log::info!("holder updated shortlist 42, transaction still open");
        Ok(())
    }).await?;

    match contender.mutate(42, None, || async{ Ok(()) }).await{
        Err(e) if e.is_busy() => log::info!("contender got busy as expected: {}", e.message()),
        Err(e) => return Err(e),
        Ok(()) => log::warn!("contender got in while the transaction was open"),
    }

    tx.complete(TxOutcome::Committed).await;
    contender.mutate(42, None, || async{
        log::info!("contender updated shortlist 42 after the commit");
        Ok(())
    }).await?;

    let notifier = NotifyService::new(app_state.mail_throttle.clone(), LogMailer);
    let recipient = "demo@castkeeper.local";
    for _ in 0..2{
        let res = notifier.notify(recipient, MailTemplate::Invitation, serde_json::json!({ "project": "demo" })).await?;
        print_throttled(recipient, &MailTemplate::Invitation, &res);
    }

    Ok(())

}
