//! Shared harness for end-to-end tests.
//!
//! Writes archives into a temporary directory, runs the real gzip source and
//! SQLite sink through the ingestor, and hands back the resulting pool.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;
use sqlx::SqlitePool;
use tempfile::TempDir;

use lw_ingest::{GzipArchiveSource, IngestConfig, IngestSummary, Ingestor};
use lw_store::{SqliteSink, db};

pub struct TestHarness {
    pub dir: TempDir,
    pub config: IngestConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("archives");
        std::fs::create_dir(&input_dir).unwrap();
        let config = IngestConfig {
            input_dir,
            database_path: dir.path().join("logs.db"),
            ..IngestConfig::default()
        };
        Self { dir, config }
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn checkpoint_interval(mut self, n: u64) -> Self {
        self.config.checkpoint_interval = n;
        self
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.config.input_dir.join(name)
    }

    /// Gzip `lines` (newline-terminated) into the archive directory.
    pub fn write_gz(&self, name: &str, lines: &[&str]) {
        std::fs::write(self.archive_path(name), gzip(lines)).unwrap();
    }

    /// A gzip archive cut off halfway through its compressed stream.
    pub fn write_truncated_gz(&self, name: &str, lines: &[String]) {
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let bytes = gzip(&lines);
        std::fs::write(self.archive_path(name), &bytes[..bytes.len() / 2]).unwrap();
    }

    /// Ingest everything in the archive directory, build indexes, and return
    /// the run summary with a pool on the new database.
    pub async fn ingest(&self) -> (IngestSummary, SqlitePool) {
        let pool = db::create(&self.config.database_path, self.config.replace_existing)
            .await
            .unwrap();
        let source = GzipArchiveSource::new(&self.config.input_dir, &self.config.input_pattern);
        let ingestor = Ingestor::new(self.config.clone()).unwrap();
        let mut sink = SqliteSink::new(pool.clone());
        let summary = ingestor.run(&source, &mut sink).await.unwrap();
        db::create_indexes(&pool).await.unwrap();
        (summary, pool)
    }
}

pub fn gzip(lines: &[&str]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        enc.write_all(line.as_bytes()).unwrap();
        enc.write_all(b"\n").unwrap();
    }
    enc.finish().unwrap()
}

/// `(message, stack_trace)` for every linked trace, ordered by trace id.
pub async fn linked_traces(pool: &SqlitePool) -> Vec<(String, String)> {
    sqlx::query_as(
        "SELECT l.message, st.stack_trace
         FROM stack_traces st JOIN logs l ON l.id = st.log_id
         ORDER BY st.id",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}
