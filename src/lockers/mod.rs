


/* ---------------------------------------------------------------
  ╰┈➤    coordination lockers
   ---------------------------------------------------------------
    keys.rs    ▶ turns a key template or closure plus call arguments into a lock key
    dlm.rs     ▶ distributed lock manager over the shared coordination store
    txguard.rs ▶ wraps a caller operation, holds the lock while it runs and releases
                 it either right away or once the ambient transaction completes
*/

pub mod keys;
pub mod dlm;
pub mod txguard;

use std::str::FromStr;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::consts::*;


#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit{
    Millis,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit{
    pub fn to_duration(self, amount: u64) -> Duration{
        match self{
            TimeUnit::Millis => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3600)),
        }
    }
}

impl FromStr for TimeUnit{
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str(){
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Millis),
            "s" | "sec" | "secs" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "mins" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hours" => Ok(TimeUnit::Hours),
            other => Err(format!("unknown time unit {}", other)),
        }
    }
}

// wait and lease declared by a coordinated operation, both counted in unit
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOptions{
    pub wait_time: u64,
    pub lease_time: u64,
    pub unit: TimeUnit,
}

impl Default for LockOptions{
    fn default() -> Self {
        Self{
            wait_time: LOCK_DEFAULT_WAIT,
            lease_time: LOCK_DEFAULT_LEASE,
            unit: TimeUnit::Seconds,
        }
    }
}

impl LockOptions{

    pub fn new(wait_time: u64, lease_time: u64, unit: TimeUnit) -> Self{
        Self{ wait_time, lease_time, unit }
    }

    pub fn wait(&self) -> Duration{
        self.unit.to_duration(self.wait_time)
    }

    /// The lease must outlive the worst-case run of the protected operation,
    /// once it lapses the store drops the record and another caller can get in
    /// while this one is still working.
    pub fn lease(&self) -> Duration{
        self.unit.to_duration(self.lease_time)
    }
}
