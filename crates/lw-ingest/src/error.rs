//! Ingestion error types.

use thiserror::Error;

/// Errors that abort the processing of an archive (or the whole run).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("archive not found: {0}")]
    NotFound(String),

    #[error("decode error in {archive}: {message}")]
    Decode { archive: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("linkage error: {0}")]
    Linkage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for ingestion results.
pub type IngestResult<T> = Result<T, IngestError>;

/// A fault confined to a single line.
///
/// Never aborts an archive: the driver records it as a parsing error and
/// moves on to the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LineFault {
    #[error("line of {len} bytes exceeds the {limit} byte limit")]
    LineTooLong { len: usize, limit: usize },

    #[error("record would grow to {len} bytes, exceeding the {limit} byte limit")]
    RecordTooLarge { len: usize, limit: usize },
}
