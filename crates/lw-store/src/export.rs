//! Snapshot export of an ingested database to JSON Lines files.
//!
//! Each exported relation becomes one file named
//! `<prefix>_<YYYYMMDD_HHMMSS>.jsonl`, one JSON object per row.

use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

// ── Row types ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RecordRow {
    pub id: i64,
    pub timestamp: Option<String>,
    pub thread: Option<String>,
    pub level: Option<String>,
    pub module: Option<String>,
    pub message: Option<String>,
    pub source_file: Option<String>,
    pub raw_log: Option<String>,
    pub has_stack_trace: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StackTraceRecordRow {
    pub id: i64,
    pub log_id: i64,
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ParsingErrorRow {
    pub id: i64,
    pub line: Option<String>,
    pub source_file: Option<String>,
    pub error_message: Option<String>,
    pub timestamp: Option<String>,
}

// ── What to export ──────────────────────────────────────────

/// One exportable relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    ParsingErrors,
    /// Records at ERROR or CRITICAL level.
    ErrorLogs,
    /// Traces owned by exported error records.
    StackTraces,
    AllLogs,
}

impl Relation {
    pub fn file_prefix(self) -> &'static str {
        match self {
            Relation::ParsingErrors => "parsing_errors",
            Relation::ErrorLogs => "error_logs",
            Relation::StackTraces => "stack_traces",
            Relation::AllLogs => "all_logs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportKind {
    Parsing,
    Logs,
    StackTraces,
    #[default]
    All,
    FullDb,
}

impl ExportKind {
    pub fn relations(self) -> &'static [Relation] {
        match self {
            ExportKind::Parsing => &[Relation::ParsingErrors],
            ExportKind::Logs => &[Relation::ErrorLogs],
            ExportKind::StackTraces => &[Relation::StackTraces],
            ExportKind::All => &[
                Relation::ParsingErrors,
                Relation::ErrorLogs,
                Relation::StackTraces,
            ],
            ExportKind::FullDb => &[Relation::AllLogs],
        }
    }
}

impl FromStr for ExportKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parsing" => Ok(ExportKind::Parsing),
            "logs" => Ok(ExportKind::Logs),
            "stack_traces" | "stacktraces" => Ok(ExportKind::StackTraces),
            "all" => Ok(ExportKind::All),
            "full_db" | "fulldb" => Ok(ExportKind::FullDb),
            other => Err(StoreError::InvalidQuery(format!(
                "unknown export type '{other}' (expected parsing, logs, stack_traces, all, full_db)"
            ))),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportKind::Parsing => "parsing",
            ExportKind::Logs => "logs",
            ExportKind::StackTraces => "stack_traces",
            ExportKind::All => "all",
            ExportKind::FullDb => "full_db",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub kind: ExportKind,
    /// Row limit applied to each relation; zero or negative means no limit.
    pub limit: Option<i64>,
    /// Explicit file path; honoured only when a single relation is exported.
    pub output: Option<PathBuf>,
    /// Directory for generated file names.
    pub out_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            kind: ExportKind::default(),
            limit: None,
            output: None,
            out_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub relation: &'static str,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub files: Vec<ExportedFile>,
    /// Relations that had no rows and produced no file.
    pub empty: Vec<&'static str>,
}

// ── Export ──────────────────────────────────────────────────

pub async fn export(pool: &SqlitePool, options: &ExportOptions) -> StoreResult<ExportReport> {
    let relations = options.kind.relations();
    if options.output.is_some() && relations.len() > 1 {
        tracing::warn!(
            kind = %options.kind,
            "explicit output path ignored when exporting several relations"
        );
    }
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let limit = options.limit.filter(|n| *n > 0).unwrap_or(-1);

    let mut report = ExportReport::default();
    for &relation in relations {
        let path = match (&options.output, relations.len()) {
            (Some(path), 1) => path.clone(),
            _ => options
                .out_dir
                .join(format!("{}_{stamp}.jsonl", relation.file_prefix())),
        };

        let rows = match relation {
            Relation::ParsingErrors => write_rows(&path, &parsing_errors(pool, limit).await?).await?,
            Relation::ErrorLogs => write_rows(&path, &error_logs(pool, limit).await?).await?,
            Relation::StackTraces => write_rows(&path, &stack_traces(pool, limit).await?).await?,
            Relation::AllLogs => write_rows(&path, &all_logs(pool, limit).await?).await?,
        };

        let prefix = relation.file_prefix();
        if rows == 0 {
            tracing::info!(relation = prefix, "no rows, nothing written");
            report.empty.push(prefix);
        } else {
            tracing::info!(relation = prefix, rows, path = %path.display(), "exported");
            report.files.push(ExportedFile {
                relation: prefix,
                path,
                rows,
            });
        }
    }
    Ok(report)
}

// SQLite treats a negative LIMIT as unbounded.

pub async fn parsing_errors(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<ParsingErrorRow>> {
    let rows = sqlx::query_as::<_, ParsingErrorRow>(
        "SELECT id, line, source_file, error_message, timestamp
         FROM parsing_errors ORDER BY id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn error_logs(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<RecordRow>> {
    let rows = sqlx::query_as::<_, RecordRow>(
        "SELECT id, timestamp, thread, level, module, message, source_file, raw_log, has_stack_trace
         FROM logs WHERE level IN ('ERROR', 'CRITICAL') ORDER BY id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Traces of the error records `error_logs(pool, limit)` would return.
pub async fn stack_traces(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<StackTraceRecordRow>> {
    let rows = sqlx::query_as::<_, StackTraceRecordRow>(
        "SELECT st.id, st.log_id, st.stack_trace
         FROM stack_traces st
         WHERE st.log_id IN (
             SELECT id FROM (
                 SELECT id, has_stack_trace FROM logs
                 WHERE level IN ('ERROR', 'CRITICAL') ORDER BY id LIMIT ?
             ) WHERE has_stack_trace = 1
         )
         ORDER BY st.id LIMIT ?",
    )
    .bind(limit)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn all_logs(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<RecordRow>> {
    let rows = sqlx::query_as::<_, RecordRow>(
        "SELECT id, timestamp, thread, level, module, message, source_file, raw_log, has_stack_trace
         FROM logs ORDER BY id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Write `rows` as JSON Lines. Writes nothing for an empty slice.
async fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> StoreResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut body = String::new();
    for row in rows {
        body.push_str(
            &serde_json::to_string(row).map_err(|e| StoreError::Serialization(e.to_string()))?,
        );
        body.push('\n');
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
    Ok(rows.len())
}
