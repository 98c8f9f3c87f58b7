//! Core entity types shared by the stitcher, the batch writer and sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a log record by the storage sink.
pub type RecordId = i64;

/// Reason recorded for an unclassified line with no open record.
pub const REASON_ORPHAN_CONTINUATION: &str = "continuation line without a parent record";

/// Reason recorded for stack-trace lines that arrived before any record.
pub const REASON_ORPHAN_STACK_TRACE: &str = "stack trace without a parent record";

// ── Log Record ────────────────────────────────────────────────

/// One structured log event, possibly assembled from several raw lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Archive-native timestamp text (e.g. `2025-03-06 00:00:00,024`).
    pub timestamp: String,
    pub thread: String,
    pub level: String,
    /// Empty when the line had no isolable module token.
    pub module: String,
    pub message: String,
    /// Name of the archive this record came from.
    pub source_file: String,
    /// Full raw text, including continuation lines.
    pub raw_log: String,
    pub has_stack_trace: bool,
}

impl LogRecord {
    /// Append a continuation line to both the message and the raw text.
    pub fn append_continuation(&mut self, line: &str) {
        self.message.push('\n');
        self.message.push_str(line);
        self.raw_log.push('\n');
        self.raw_log.push_str(line);
    }
}

// ── Stack Trace ───────────────────────────────────────────────

/// A stack trace resolved against its owning record's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTraceRow {
    pub log_id: RecordId,
    pub stack_trace: String,
}

// ── Parsing Error ─────────────────────────────────────────────

/// A line that could not be stitched into any record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingError {
    pub line: String,
    pub source_file: String,
    pub error_message: String,
    /// Wall-clock time the error was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl ParsingError {
    pub fn new(
        line: impl Into<String>,
        source_file: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            line: line.into(),
            source_file: source_file.into(),
            error_message: error_message.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Timestamp in SQLite `CURRENT_TIMESTAMP` layout.
    pub fn recorded_at_text(&self) -> String {
        self.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// ── Stitcher output ───────────────────────────────────────────

/// A record that will receive no further lines, together with its
/// closed stack trace (if one was collected while it was open).
///
/// The trace stays attached to its owner until the owner is flushed and
/// has an identifier, so linkage never depends on insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecord {
    pub record: LogRecord,
    pub stack_trace: Option<String>,
}

/// Entity handed from the stitcher to the batch writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    Record(FinishedRecord),
    Error(ParsingError),
}
