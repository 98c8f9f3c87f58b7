//! Batched persistence with deferred stack-trace linkage.
//!
//! Records, stack traces and parsing errors are buffered per kind and
//! written to the [`LogSink`] in bulk once a buffer reaches the batch size.
//!
//! A stack trace cannot be written before its owning record has an
//! identifier, and identifiers only exist after the record batch is
//! flushed. Finished records therefore wait in the record buffer *with*
//! their closed trace; flushing that buffer returns one identifier per
//! record, and each carried trace is stamped with its own owner's
//! identifier before it moves to the trace buffer.

use crate::error::{IngestError, IngestResult};
use crate::sink::LogSink;
use crate::types::{Emitted, FinishedRecord, LogRecord, ParsingError, RecordId, StackTraceRow};

/// Default number of entries per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Counts of entities written by one writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub records: u64,
    pub stack_traces: u64,
    pub errors: u64,
    pub flushes: u64,
    pub checkpoints: u64,
}

/// Per-archive batch buffer in front of a sink.
pub struct BatchWriter<'a, S: LogSink + ?Sized> {
    sink: &'a mut S,
    batch_size: usize,
    /// Records awaiting an identifier, each with its unresolved trace.
    records: Vec<FinishedRecord>,
    traces: Vec<StackTraceRow>,
    errors: Vec<ParsingError>,
    last_persisted_id: Option<RecordId>,
    stats: WriterStats,
}

impl<'a, S: LogSink + ?Sized> BatchWriter<'a, S> {
    /// Open a unit of work on `sink` and start buffering.
    pub async fn begin(sink: &'a mut S, batch_size: usize) -> IngestResult<Self> {
        if batch_size == 0 {
            return Err(IngestError::Config("batch size must be at least 1".into()));
        }
        sink.begin().await?;
        Ok(Self {
            sink,
            batch_size,
            records: Vec::with_capacity(batch_size),
            traces: Vec::new(),
            errors: Vec::new(),
            last_persisted_id: None,
            stats: WriterStats::default(),
        })
    }

    /// Identifier of the last record of the most recently flushed batch.
    pub fn last_persisted_id(&self) -> Option<RecordId> {
        self.last_persisted_id
    }

    /// Records buffered but not yet flushed.
    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Buffer whatever the stitcher emitted.
    pub async fn accept(&mut self, emitted: Emitted) -> IngestResult<()> {
        match emitted {
            Emitted::Record(finished) => self.push_record(finished).await,
            Emitted::Error(error) => self.push_error(error).await,
        }
    }

    pub async fn push_record(&mut self, finished: FinishedRecord) -> IngestResult<()> {
        self.records.push(finished);
        if self.records.len() >= self.batch_size {
            self.flush_records().await?;
        }
        Ok(())
    }

    pub async fn push_error(&mut self, error: ParsingError) -> IngestResult<()> {
        self.errors.push(error);
        if self.errors.len() >= self.batch_size {
            self.flush_errors().await?;
        }
        Ok(())
    }

    /// Write the record buffer and resolve the traces it carries.
    pub async fn flush_records(&mut self) -> IngestResult<()> {
        if self.records.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.records);
        let (rows, traces): (Vec<LogRecord>, Vec<Option<String>>) = pending
            .into_iter()
            .map(|f| (f.record, f.stack_trace))
            .unzip();

        let ids = self.sink.insert_records(&rows).await?;
        if ids.len() != rows.len() {
            return Err(IngestError::Linkage(format!(
                "sink returned {} identifiers for {} records",
                ids.len(),
                rows.len()
            )));
        }
        self.stats.records += rows.len() as u64;
        self.stats.flushes += 1;
        self.last_persisted_id = ids.last().copied();
        tracing::debug!(
            records = rows.len(),
            last_id = ?self.last_persisted_id,
            "flushed record batch"
        );

        for (log_id, trace) in ids.into_iter().zip(traces) {
            if let Some(stack_trace) = trace {
                self.traces.push(StackTraceRow {
                    log_id,
                    stack_trace,
                });
                if self.traces.len() >= self.batch_size {
                    self.flush_traces().await?;
                }
            }
        }
        Ok(())
    }

    pub async fn flush_traces(&mut self) -> IngestResult<()> {
        if self.traces.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.traces);
        self.sink.insert_stack_traces(&batch).await?;
        self.stats.stack_traces += batch.len() as u64;
        self.stats.flushes += 1;
        tracing::debug!(stack_traces = batch.len(), "flushed stack trace batch");
        Ok(())
    }

    pub async fn flush_errors(&mut self) -> IngestResult<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.errors);
        self.sink.insert_errors(&batch).await?;
        self.stats.errors += batch.len() as u64;
        self.stats.flushes += 1;
        tracing::debug!(errors = batch.len(), "flushed parsing error batch");
        Ok(())
    }

    /// Flush every buffer. Records go first so their traces can be resolved.
    pub async fn flush_all(&mut self) -> IngestResult<()> {
        self.flush_records().await?;
        self.flush_traces().await?;
        self.flush_errors().await
    }

    /// Flush everything, commit, and open a fresh unit of work.
    pub async fn checkpoint(&mut self) -> IngestResult<()> {
        self.flush_all().await?;
        self.sink.commit().await?;
        self.sink.begin().await?;
        self.stats.checkpoints += 1;
        Ok(())
    }

    /// Flush everything and commit. Consumes the writer.
    pub async fn finish(mut self) -> IngestResult<WriterStats> {
        self.flush_all().await?;
        self.sink.commit().await?;
        Ok(self.stats)
    }

    /// Drop buffered entries and roll back the uncommitted unit of work.
    pub async fn abort(self) -> IngestResult<()> {
        self.sink.rollback().await
    }
}
