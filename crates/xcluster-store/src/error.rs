use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization conflict on key {0}, exhausted retries")]
    SerializationConflict(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("cluster not found: {0}")]
    ClusterNotFound(uuid::Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// best-effort classification of a sqlx error as safe to retry: unique
/// violations on the cluster key race and serialization failures under
/// the `SERIALIZABLE` isolation level the store runs transactions at.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    let Some(db_err) = err.as_database_error() else {
        return false;
    };
    match db_err.code().as_deref() {
        // unique_violation, serialization_failure, deadlock_detected
        Some("23505") | Some("40001") | Some("40P01") => true,
        _ => false,
    }
}
