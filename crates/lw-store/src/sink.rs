//! SQLite implementation of the ingestion sink.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};

use lw_ingest::{IngestError, IngestResult, LogRecord, LogSink, ParsingError, RecordId, StackTraceRow};

use crate::error::StoreError;

/// Rows per multi-row `INSERT`, well below SQLite's bound-parameter limit.
const ROWS_PER_STATEMENT: usize = 500;

/// Writes batches into the `logs`, `stack_traces` and `parsing_errors`
/// tables, one transaction per unit of work.
pub struct SqliteSink {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, tx: None }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn tx(&mut self) -> IngestResult<&mut Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| IngestError::Storage("no open transaction".into()))
    }
}

fn storage(e: sqlx::Error) -> IngestError {
    StoreError::from(e).into()
}

#[async_trait]
impl LogSink for SqliteSink {
    async fn begin(&mut self) -> IngestResult<()> {
        if let Some(stale) = self.tx.take() {
            stale.rollback().await.map_err(storage)?;
        }
        self.tx = Some(self.pool.begin().await.map_err(storage)?);
        Ok(())
    }

    // Row by row so each record's id comes from its own insert.
    async fn insert_records(&mut self, records: &[LogRecord]) -> IngestResult<Vec<RecordId>> {
        let tx = self.tx()?;
        let mut ids = Vec::with_capacity(records.len());
        for r in records {
            let result = sqlx::query(
                "INSERT INTO logs (timestamp, thread, level, module, message, source_file, raw_log, has_stack_trace)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(r.timestamp.as_str())
            .bind(r.thread.as_str())
            .bind(r.level.as_str())
            .bind(r.module.as_str())
            .bind(r.message.as_str())
            .bind(r.source_file.as_str())
            .bind(r.raw_log.as_str())
            .bind(r.has_stack_trace)
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
            ids.push(result.last_insert_rowid());
        }
        Ok(ids)
    }

    async fn insert_stack_traces(&mut self, traces: &[StackTraceRow]) -> IngestResult<()> {
        let tx = self.tx()?;
        for chunk in traces.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO stack_traces (log_id, stack_trace) ");
            qb.push_values(chunk, |mut b, t| {
                b.push_bind(t.log_id).push_bind(t.stack_trace.as_str());
            });
            qb.build().execute(&mut **tx).await.map_err(storage)?;
        }
        Ok(())
    }

    async fn insert_errors(&mut self, errors: &[ParsingError]) -> IngestResult<()> {
        let tx = self.tx()?;
        for chunk in errors.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO parsing_errors (line, source_file, error_message, timestamp) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.line.as_str())
                    .push_bind(e.source_file.as_str())
                    .push_bind(e.error_message.as_str())
                    .push_bind(e.recorded_at_text());
            });
            qb.build().execute(&mut **tx).await.map_err(storage)?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> IngestResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| IngestError::Storage("no open transaction".into()))?;
        tx.commit().await.map_err(storage)
    }

    async fn rollback(&mut self) -> IngestResult<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(storage),
            None => Ok(()),
        }
    }
}
