


use std::time::Duration;
use crate::consts::*;
use crate::error::*;


#[test]
fn busy_is_its_own_outcome(){
    let busy = CoordErrorResponse::from(LockError::AcquisitionFailed{
        key: String::from("shortlist:42"),
        waited: Duration::from_secs(1)
    });
    assert!(busy.is_busy());
    assert_eq!(busy.code, *RESOURCE_BUSY_ERROR_CODE);
    assert_eq!(busy.status(), 423);
    assert!(busy.message().starts_with(RESOURCE_BUSY));
}

#[test]
fn statuses_follow_the_failing_concern(){
    let key = CoordErrorResponse::from(KeyResolutionError::Empty{ template: String::from("{id}") });
    assert_eq!(key.status(), 500);
    assert!(!key.is_busy());

    let store = CoordErrorResponse::from(StorageError::Unavailable(String::from("down")));
    assert_eq!(store.status(), 503);
    assert_eq!(store.code, *STORAGE_IO_ERROR_CODE);

    assert_eq!(CoordErrorResponse::from(TxError::Completed).status(), 409);
    assert_eq!(CoordErrorResponse::from(ConfigError::Missing(String::from("DATABASE_URL"))).status(), 500);
}

#[test]
fn debug_prints_the_cause(){
    let err = LockError::from(KeyResolutionError::Unbound{
        template: String::from("shortlist:{shortlistId}"),
        name: String::from("shortlistId")
    });
    let printed = format!("{:?}", err);
    assert!(printed.contains("Caused by"));
    assert!(printed.contains("shortlistId"));
}

#[test]
fn new_keeps_the_method_name(){
    let err = CoordErrorResponse::new(
        *TX_ERROR_CODE,
        b"late hook".to_vec(),
        ErrorKind::Tx(TxError::Completed),
        "with_lock"
    );
    assert_eq!(err.method_name, "with_lock");
    assert!(err.to_string().contains("late hook"));
}
