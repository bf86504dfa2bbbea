


// engine picks the coordination store (redis or ram) and the optional postgres pool


use std::sync::Arc;
use uuid::Uuid;
use sea_orm::{Database, DatabaseConnection, ConnectOptions};
use crate::config::Env as ConfigEnv;
use crate::error::{ConfigError, CoordErrorResponse, ErrorKind};
use crate::interfaces::store::CoordStore;
use crate::consts::*;
use super::ramdb::RamStore;
use super::redis::RedisStore;


/*  --------------------------
   | shared state storage
   |--------------------------
   | coordination store (redis or ram)
   | seaorm postgres pool
   |
*/

pub struct Bucket{
    pub mode: Mode,
    pub coord_store: Arc<dyn CoordStore>,
    pub seaorm_pool: Option<DatabaseConnection>,
}

pub struct Storage{
    pub id: Uuid,
    pub bucket: Bucket,
}

// On: coordination goes through redis and is shared by every instance,
// Off: an in process ram store, only tasks of this process are coordinated
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode{
    #[default]
    On,
    Off,
}

impl Storage{

    pub async fn new(env: &ConfigEnv) -> Result<Arc<Self>, CoordErrorResponse>{

        let (mode, coord_store): (Mode, Arc<dyn CoordStore>) =
            match env.STORE_ENGINE.trim().to_ascii_lowercase().as_str(){
                "redis" => {
                    log::info!("🔒 coordinating through redis on address: [{}:{}]", env.REDIS_HOST, env.REDIS_PORT);
                    let redis_store = RedisStore::from_url(&env.redis_url())
                        .map_err(CoordErrorResponse::from)?;
                    (Mode::On, Arc::new(redis_store))
                },
                "ram" => {
                    log::warn!("🔓 coordinating through the in memory store, locks are local to this process");
                    (Mode::Off, Arc::new(RamStore::new()))
                },
                other => {
                    let err = ConfigError::Invalid{
                        var: String::from("STORE_ENGINE"),
                        value: other.to_string()
                    };
                    return Err(CoordErrorResponse::new(
                        *CONFIG_ERROR_CODE,
                        err.to_string().as_bytes().to_vec(),
                        ErrorKind::Config(err),
                        "Storage::new"
                    ));
                }
            };

        let seaorm_pool = if env.DATABASE_URL.trim().is_empty(){
            None
        } else{
            let mut opt = ConnectOptions::new(env.DATABASE_URL.clone());
            opt.max_connections(100)
                .min_connections(5)
                .connect_timeout(std::time::Duration::from_secs(8))
                .acquire_timeout(std::time::Duration::from_secs(8))
                .idle_timeout(std::time::Duration::from_secs(8))
                .max_lifetime(std::time::Duration::from_secs(8))
                .sqlx_logging(true)
                .sqlx_logging_level(log::LevelFilter::Info)
                .set_schema_search_path("public"); // postgres default schema is public
            log::info!("🛢️ connecting to postgres");
            Some(Database::connect(opt).await?)
        };

        Ok(
            Arc::new(
                Storage{
                    id: Uuid::new_v4(),
                    bucket: Bucket{ mode, coord_store, seaorm_pool },
                }
            )
        )

    }

    // a storage over an explicit store, no external pools
    pub fn with_store(coord_store: Arc<dyn CoordStore>) -> Arc<Self>{
        Arc::new(
            Storage{
                id: Uuid::new_v4(),
                bucket: Bucket{
                    mode: Mode::Off,
                    coord_store,
                    seaorm_pool: None,
                },
            }
        )
    }

    pub fn get_coord_store(&self) -> Arc<dyn CoordStore>{
        self.bucket.coord_store.clone()
    }

    pub fn get_seaorm_pool(&self) -> Result<&DatabaseConnection, ConfigError>{
        self.bucket.seaorm_pool
            .as_ref()
            .ok_or_else(|| ConfigError::Missing(String::from("DATABASE_URL")))
    }

    pub fn mode(&self) -> Mode{
        self.bucket.mode
    }

}
