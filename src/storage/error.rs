use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("stored timestamp out of range: {0}")]
    Timestamp(#[from] time::error::ComponentRange),
}

pub type StorageResult<T> = Result<T, StorageError>;
