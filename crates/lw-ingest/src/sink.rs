//! Storage sink abstraction — where flushed batches go.

use async_trait::async_trait;

use crate::error::IngestResult;
use crate::types::{LogRecord, ParsingError, RecordId, StackTraceRow};

/// Append-only destination for records, stack traces and parsing errors.
///
/// Writes happen inside a unit of work opened by [`LogSink::begin`] and
/// made durable by [`LogSink::commit`]. Implementations: the SQLite sink in
/// `lw-store` and [`crate::MemorySink`] for tests.
#[async_trait]
pub trait LogSink: Send {
    /// Open a unit of work. Called before the first insert of an archive
    /// and after every checkpoint.
    async fn begin(&mut self) -> IngestResult<()>;

    /// Insert records in order and return the identifier assigned to each,
    /// in the same order.
    async fn insert_records(&mut self, records: &[LogRecord]) -> IngestResult<Vec<RecordId>>;

    async fn insert_stack_traces(&mut self, traces: &[StackTraceRow]) -> IngestResult<()>;

    async fn insert_errors(&mut self, errors: &[ParsingError]) -> IngestResult<()>;

    /// Make the current unit of work durable.
    async fn commit(&mut self) -> IngestResult<()>;

    /// Discard the current unit of work. A no-op when none is open.
    async fn rollback(&mut self) -> IngestResult<()>;
}
