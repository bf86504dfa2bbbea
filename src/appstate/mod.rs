


use std::sync::Arc;
use crate::config::{Env as ConfigEnv, Context, CoordConfig};
use crate::config::EnvExt;
use crate::error::CoordErrorResponse;
use crate::interfaces::store::CoordStore;
use crate::limiters::RateLimiter;
use crate::limiters::mail::MailThrottle;
use crate::lockers::dlm::DistLock;
use crate::storage::engine::Storage;
use crate::types::CoordResult;


#[derive(Clone)]
// everything a request handler needs to coordinate, built once on startup
pub struct AppState{
    pub config: Arc<Context<ConfigEnv>>,
    pub coord: CoordConfig,
    pub app_storage: Arc<Storage>,
    pub locker: DistLock,
    pub limiter: RateLimiter,
    pub mail_throttle: MailThrottle,
}

impl AppState{

    pub async fn init() -> CoordResult<Self>{

        let env = ConfigEnv::default();
        let configs = env.get_vars()?;
        Self::from_context(configs).await

    }

    pub async fn from_context(configs: Context<ConfigEnv>) -> CoordResult<Self>{

        let coord = configs.vars.coord_config()?;
        let app_storage = Storage::new(&configs.vars).await?;

        Ok(Self::assemble(Arc::new(configs), coord, app_storage))

    }

    // an app state over an explicit store, used by tests and the ram demo
    pub fn with_store(coord_store: Arc<dyn CoordStore>, coord: CoordConfig) -> Self{
        let configs = Arc::new(Context{ vars: ConfigEnv::default() });
        Self::assemble(configs, coord, Storage::with_store(coord_store))
    }

    fn assemble(configs: Arc<Context<ConfigEnv>>, coord: CoordConfig, app_storage: Arc<Storage>) -> Self{
        let store = app_storage.get_coord_store();
        let locker = DistLock::new(store.clone(), &coord);
        let limiter = RateLimiter::new(store, &coord);
        let mail_throttle = MailThrottle::new(limiter.clone(), coord.rate_limit_window);
        Self{ config: configs, coord, app_storage, locker, limiter, mail_throttle }
    }

    pub async fn health(&self) -> Result<(), CoordErrorResponse>{
        self.app_storage.get_coord_store().ping().await?;
        Ok(())
    }

}
