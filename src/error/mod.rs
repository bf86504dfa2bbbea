


/*
    -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
          CASTKEEPER CUSTOM ERROR HELPER USING THISERROR CRATE
    -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

    coordination errors come in two layers:
        - typed enums per concern (key resolution, locking, store, tx boundary, config)
          which the library returns directly so callers can match on them, a failed
          acquisition is an expected outcome and has its own variant
        - CoordErrorResponse which wraps any of them with a code, a message and the
          method name, it's what outer layers (http handlers, the cli) get back and
          maps acquisition failures to a distinct "resource busy" status

    thiserror impls Display, Error and From for every variant, Debug is written
    manually to log the error chain with its source.
*/

use std::error::Error;
use std::time::Duration;
use thiserror::Error;
use crate::consts::*;


#[derive(Error)]
pub enum KeyResolutionError{
    #[error("[KEY] - malformed key template `{template}`: {reason}")]
    Malformed{ template: String, reason: String },
    #[error("[KEY] - key template `{template}` references unbound name `{name}`")]
    Unbound{ template: String, name: String },
    #[error("[KEY] - key template `{template}` resolved to an empty key")]
    Empty{ template: String },
}

#[derive(Error)]
pub enum LockError{
    #[error("[LOCK] - failed to resolve lock key")]
    KeyResolution(#[from] KeyResolutionError),
    #[error("[LOCK] - failed to acquire lock `{key}` within {waited:?}")]
    AcquisitionFailed{ key: String, waited: Duration },
}

#[derive(Error)]
pub enum StorageError{
    #[error("[REDIS] - failed to do redis operation")]
    Redis(#[from] deadpool_redis::redis::RedisError),
    #[error("[REDIS] - failed to get redis pool")]
    RedisPool(#[from] deadpool_redis::PoolError),
    #[error("[REDIS] - failed to create redis pool")]
    RedisPoolBuild(#[from] deadpool_redis::CreatePoolError),
    #[error("[SEAORM] - faild to do db operation")]
    SeaOrm(#[from] sea_orm::DbErr),
    #[error("[STORE] - coordination store is unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error)]
pub enum TxError{
    #[error("[TX] - transaction has already completed, no more completion hooks accepted")]
    Completed,
}

#[derive(Error)]
pub enum ConfigError{
    #[error("[CONFIG] - {0} is required but not set")]
    Missing(String),
    #[error("[CONFIG] - {var} has an invalid value `{value}`")]
    Invalid{ var: String, value: String },
    #[error("[CONFIG] - failed to load .env file")]
    Dotenv(#[from] dotenv::Error),
}

#[derive(Error)]
pub enum DispatchError{
    #[error("[MAIL] - failed to send {template} mail to {recipient}: {reason}")]
    Mail{ recipient: String, template: String, reason: String },
}

#[derive(Error)]
pub enum CodecError{
    #[error("[CODEC] - failed to do codec operations")]
    Serde(#[from] serde_json::Error)
}

#[derive(Error)]
pub enum ErrorKind{
    #[error("Key Template Error")]
    Key(KeyResolutionError),
    #[error("Lock Error")]
    Lock(LockError),
    #[error("Redis Or Seaorm Error")]
    Storage(StorageError),
    #[error("Transaction Boundary Error")]
    Tx(TxError),
    #[error("Env Config Error")]
    Config(ConfigError),
    #[error("Serde Error")]
    Codec(CodecError),
    #[error("Mail Dispatch Error")]
    Dispatch(DispatchError),
}

impl LockError{

    // busy is the normal "someone else holds it" outcome, callers
    // usually turn it into a retry hint instead of a failure
    pub fn is_busy(&self) -> bool{
        matches!(self, LockError::AcquisitionFailed { .. })
    }
}

macro_rules! impl_debug_with_source {
    ($($ty:ty),* $(,)?) => {
        $(
            impl std::fmt::Debug for $ty{
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    writeln!(f, "{}", self)?; // writing the self into the mutable buffer
                    if let Some(source) = self.source(){
                        writeln!(f, "Caused by: \n\t{}", source)?; // writing the source of the error into the mutable buffer
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_debug_with_source!(
    KeyResolutionError,
    LockError,
    StorageError,
    TxError,
    ConfigError,
    DispatchError,
    CodecError,
    ErrorKind,
);


#[derive(Error, Debug)]
pub struct CoordErrorResponse{
    pub code: u16,
    pub msg: Vec<u8>, // reason
    pub kind: ErrorKind, // due to what
    pub method_name: String // in what method
}

impl std::fmt::Display for CoordErrorResponse{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code: {} | message: {} | due to: {} | method name: {}",
            self.code, String::from_utf8_lossy(&self.msg), self.kind, self.method_name)
    }
}

impl From<(Vec<u8>, u16, ErrorKind, String)> for CoordErrorResponse{
    fn from(msg_code_kind_method: (Vec<u8>, u16, ErrorKind, String)) -> Self{
        Self { code: msg_code_kind_method.1, msg: msg_code_kind_method.0, kind: msg_code_kind_method.2, method_name: msg_code_kind_method.3 }
    }
}

impl CoordErrorResponse{

    pub fn new(code: u16, msg: Vec<u8>, kind: ErrorKind, method_name: &str) -> Self{

        let err = CoordErrorResponse::from((msg, code, kind, method_name.to_string()));
        // acquisition failures are expected and don't get logged as system failures
        if !err.is_busy(){
            log::error!("{}", err);
        }
        err

    }

    pub fn is_busy(&self) -> bool{
        matches!(&self.kind, ErrorKind::Lock(e) if e.is_busy())
    }

    // http-like status for the outer layers
    pub fn status(&self) -> u16{
        match &self.kind{
            ErrorKind::Lock(LockError::AcquisitionFailed { .. }) => 423, // locked, resource busy
            ErrorKind::Lock(LockError::KeyResolution(_)) => 500,
            ErrorKind::Key(_) => 500,
            ErrorKind::Storage(_) => 503,
            ErrorKind::Tx(_) => 409,
            ErrorKind::Config(_) => 500,
            ErrorKind::Codec(_) => 500,
            ErrorKind::Dispatch(_) => 502,
        }
    }

    pub fn message(&self) -> String{
        String::from_utf8_lossy(&self.msg).to_string()
    }
}

/* -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=
    From impls so ? can lift any typed coordination error into the response,
    the method name is left empty, CoordErrorResponse::new() fills it in when
    the caller knows where it happened
   -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-= */
impl From<LockError> for CoordErrorResponse{
    fn from(error: LockError) -> Self {
        let (code, msg) = if error.is_busy(){
            (*RESOURCE_BUSY_ERROR_CODE, format!("{}: {}", RESOURCE_BUSY, error))
        } else{
            (*KEY_RESOLUTION_ERROR_CODE, error.to_string())
        };
        Self{
            code,
            msg: msg.as_bytes().to_vec(),
            kind: ErrorKind::Lock(error),
            method_name: String::from("")
        }
    }
}

impl From<KeyResolutionError> for CoordErrorResponse{
    fn from(error: KeyResolutionError) -> Self {
        Self{
            code: *KEY_RESOLUTION_ERROR_CODE,
            msg: error.to_string().as_bytes().to_vec(),
            kind: ErrorKind::Key(error),
            method_name: String::from("")
        }
    }
}

impl From<StorageError> for CoordErrorResponse{
    fn from(error: StorageError) -> Self {
        Self{
            code: *STORAGE_IO_ERROR_CODE,
            msg: error.to_string().as_bytes().to_vec(),
            kind: ErrorKind::Storage(error),
            method_name: String::from("")
        }
    }
}

impl From<sea_orm::DbErr> for CoordErrorResponse{
    fn from(error: sea_orm::DbErr) -> Self {
        Self::from(StorageError::SeaOrm(error))
    }
}

impl From<deadpool_redis::redis::RedisError> for CoordErrorResponse{
    fn from(error: deadpool_redis::redis::RedisError) -> Self {
        Self::from(StorageError::Redis(error))
    }
}

impl From<TxError> for CoordErrorResponse{
    fn from(error: TxError) -> Self {
        Self{
            code: *TX_ERROR_CODE,
            msg: error.to_string().as_bytes().to_vec(),
            kind: ErrorKind::Tx(error),
            method_name: String::from("")
        }
    }
}

impl From<ConfigError> for CoordErrorResponse{
    fn from(error: ConfigError) -> Self {
        Self{
            code: *CONFIG_ERROR_CODE,
            msg: error.to_string().as_bytes().to_vec(),
            kind: ErrorKind::Config(error),
            method_name: String::from("")
        }
    }
}

impl From<serde_json::Error> for CoordErrorResponse{
    fn from(error: serde_json::Error) -> Self {
        Self{
            code: *CODEC_ERROR_CODE,
            msg: error.to_string().as_bytes().to_vec(),
            kind: ErrorKind::Codec(CodecError::Serde(error)),
            method_name: String::from("")
        }
    }
}

impl From<DispatchError> for CoordErrorResponse{
    fn from(error: DispatchError) -> Self {
        Self{
            code: *DISPATCH_ERROR_CODE,
            msg: error.to_string().as_bytes().to_vec(),
            kind: ErrorKind::Dispatch(error),
            method_name: String::from("")
        }
    }
}
