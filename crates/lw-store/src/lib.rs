//! SQLite storage for logweave.
//!
//! Owns the schema, the transactional [`SqliteSink`] the ingestor writes
//! through, and the read side: ad-hoc queries rendered as CSV and JSON Lines
//! export of the error-focused relations.

pub mod db;
pub mod error;
pub mod export;
pub mod query;
pub mod sink;

pub use db::DbStats;
pub use error::{StoreError, StoreResult};
pub use export::{ExportKind, ExportOptions, ExportReport, ExportedFile};
pub use query::{QueryOutput, TableInfo};
pub use sink::SqliteSink;
