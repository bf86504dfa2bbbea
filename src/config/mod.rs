


use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::consts::*;
use crate::error::ConfigError;
use crate::lockers::LockOptions;
use crate::lockers::TimeUnit;


#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[allow(non_snake_case)]
pub struct Env{
    pub ENVIRONMENT: String,
    pub NODE_ID: String,
    pub STORE_ENGINE: String,
    pub REDIS_HOST: String,
    pub REDIS_PORT: String,
    pub REDIS_USERNAME: String,
    pub REDIS_PASSWORD: String,
    pub DATABASE_URL: String,
    pub LOCK_WAIT_TIME: String,
    pub LOCK_LEASE_TIME: String,
    pub LOCK_TIME_UNIT: String,
    pub LOCK_POLL_INTERVAL_MS: String,
    pub LOCK_KEY_PREFIX: String,
    pub RATE_LIMIT_KEY_PREFIX: String,
    pub RATE_LIMIT_WINDOW_SECS: String,
}


#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Context<C>{
    pub vars: C

}
pub trait EnvExt{

    type Context;
    fn get_vars(&self) -> Result<Self::Context, ConfigError>;
}

// typed coordination settings derived from the raw env strings
#[derive(Clone, Debug, PartialEq)]
pub struct CoordConfig{
    pub node_id: String,
    pub lock_defaults: LockOptions,
    pub poll_interval: Duration,
    pub lock_prefix: String,
    pub rate_limit_prefix: String,
    pub rate_limit_window: Duration,
}

impl Default for CoordConfig{
    fn default() -> Self {
        Self{
            node_id: String::from("node-0"),
            lock_defaults: LockOptions::default(),
            poll_interval: LOCK_POLL_INTERVAL,
            lock_prefix: LOCK_KEY_PREFIX.to_string(),
            rate_limit_prefix: RATE_LIMIT_KEY_PREFIX.to_string(),
            rate_limit_window: RATE_LIMIT_DEFAULT_WINDOW,
        }
    }
}

fn var_or(name: &str, default: &str) -> String{
    match std::env::var(name){
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn parse_u64(var: &str, value: &str) -> Result<u64, ConfigError>{
    value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid{
        var: var.to_string(),
        value: value.to_string()
    })
}

impl EnvExt for Env{

    type Context = Context<Self>;

    fn get_vars(&self) -> Result<Self::Context, ConfigError> {

        // a missing .env is fine, everything has a default, a broken one isn't
        match dotenv::dotenv(){
            Ok(_) => {},
            Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(ConfigError::Dotenv(e)),
        }

        let ctx = Context::<Env>{ // context contains a generic of type Env vars
            vars: Env{
                ENVIRONMENT: var_or("ENVIRONMENT", "dev"),
                NODE_ID: var_or("NODE_ID", "node-0"),
                STORE_ENGINE: var_or("STORE_ENGINE", "redis"),
                REDIS_HOST: var_or("REDIS_HOST", "127.0.0.1"),
                REDIS_PORT: var_or("REDIS_PORT", "6379"),
                REDIS_USERNAME: var_or("REDIS_USERNAME", ""),
                REDIS_PASSWORD: var_or("REDIS_PASSWORD", ""),
                DATABASE_URL: var_or("DATABASE_URL", ""),
                LOCK_WAIT_TIME: var_or("LOCK_WAIT_TIME", &LOCK_DEFAULT_WAIT.to_string()),
                LOCK_LEASE_TIME: var_or("LOCK_LEASE_TIME", &LOCK_DEFAULT_LEASE.to_string()),
                LOCK_TIME_UNIT: var_or("LOCK_TIME_UNIT", LOCK_DEFAULT_UNIT),
                LOCK_POLL_INTERVAL_MS: var_or("LOCK_POLL_INTERVAL_MS", &LOCK_POLL_INTERVAL.as_millis().to_string()),
                LOCK_KEY_PREFIX: var_or("LOCK_KEY_PREFIX", LOCK_KEY_PREFIX),
                RATE_LIMIT_KEY_PREFIX: var_or("RATE_LIMIT_KEY_PREFIX", RATE_LIMIT_KEY_PREFIX),
                RATE_LIMIT_WINDOW_SECS: var_or("RATE_LIMIT_WINDOW_SECS", &RATE_LIMIT_DEFAULT_WINDOW.as_secs().to_string()),
            }
        };

        Ok(ctx)

    }

}

impl Env{

    pub fn coord_config(&self) -> Result<CoordConfig, ConfigError>{

        let unit = self.LOCK_TIME_UNIT.parse::<TimeUnit>()
            .map_err(|_| ConfigError::Invalid{
                var: String::from("LOCK_TIME_UNIT"),
                value: self.LOCK_TIME_UNIT.clone()
            })?;
        let wait = parse_u64("LOCK_WAIT_TIME", &self.LOCK_WAIT_TIME)?;
        let lease = parse_u64("LOCK_LEASE_TIME", &self.LOCK_LEASE_TIME)?;
        if lease == 0{
            return Err(ConfigError::Invalid{
                var: String::from("LOCK_LEASE_TIME"),
                value: self.LOCK_LEASE_TIME.clone()
            });
        }
        let poll_ms = parse_u64("LOCK_POLL_INTERVAL_MS", &self.LOCK_POLL_INTERVAL_MS)?;
        let window_secs = parse_u64("RATE_LIMIT_WINDOW_SECS", &self.RATE_LIMIT_WINDOW_SECS)?;

        Ok(
            CoordConfig{
                node_id: self.NODE_ID.clone(),
                lock_defaults: LockOptions::new(wait, lease, unit),
                poll_interval: Duration::from_millis(poll_ms.max(1)),
                lock_prefix: self.LOCK_KEY_PREFIX.clone(),
                rate_limit_prefix: self.RATE_LIMIT_KEY_PREFIX.clone(),
                rate_limit_window: Duration::from_secs(window_secs.max(1)),
            }
        )
    }

    pub fn redis_url(&self) -> String{
        if !self.REDIS_PASSWORD.is_empty() && !self.REDIS_USERNAME.is_empty(){
            format!("redis://{}:{}@{}:{}", self.REDIS_USERNAME, self.REDIS_PASSWORD, self.REDIS_HOST, self.REDIS_PORT)
        } else if !self.REDIS_PASSWORD.is_empty(){
            format!("redis://:{}@{}:{}", self.REDIS_PASSWORD, self.REDIS_HOST, self.REDIS_PORT)
        } else{
            format!("redis://{}:{}", self.REDIS_HOST, self.REDIS_PORT)
        }
    }
}
