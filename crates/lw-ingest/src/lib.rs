//! Log archive ingestion core for logweave.
//!
//! Classifies lines of `timestamp [thread] LEVEL module - message` logs,
//! stitches continuation lines and stack traces onto their owning record,
//! and persists records, stack traces and parsing errors in bounded
//! batches through a `LogSink`, linking each trace to its owner's
//! identifier only after the owner has been written.

pub mod batch;
pub mod config;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod mock;
pub mod sink;
pub mod source;
pub mod stitch;
pub mod types;

// Re-export key types for convenience
pub use batch::{BatchWriter, WriterStats};
pub use config::IngestConfig;
pub use error::{IngestError, IngestResult, LineFault};
pub use ingest::{ArchiveReport, FailedArchive, IngestSummary, Ingestor};
pub use matcher::{LineClass, RecordHead, Shape};
pub use mock::{MemorySink, MockArchiveSource};
pub use sink::LogSink;
pub use source::{ArchiveSource, GzipArchiveSource, LineStream};
pub use stitch::{LineOutcome, Stitcher, StitchStats};
pub use types::{Emitted, FinishedRecord, LogRecord, ParsingError, RecordId, StackTraceRow};
