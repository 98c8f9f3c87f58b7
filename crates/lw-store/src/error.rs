//! Storage error types.

use lw_ingest::IngestError;
use thiserror::Error;

/// Errors from the SQLite store, query facade and export.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        IngestError::Storage(e.to_string())
    }
}
