//! Ingestion configuration, loadable from TOML.

use serde::Deserialize;
use std::path::PathBuf;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::error::{IngestError, IngestResult};
use crate::stitch::{DEFAULT_MAX_LINE_BYTES, DEFAULT_MAX_RECORD_BYTES, Limits};

/// Settings for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory searched for archives.
    pub input_dir: PathBuf,
    /// Wildcard pattern selecting archive file names (`*` and `?`).
    pub input_pattern: String,
    /// SQLite database file to create.
    pub database_path: PathBuf,
    /// Entries per bulk insert.
    pub batch_size: usize,
    /// Lines between durability checkpoints.
    pub checkpoint_interval: u64,
    pub max_line_bytes: usize,
    pub max_record_bytes: usize,
    /// Remove an existing database file before ingesting.
    pub replace_existing: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            input_pattern: "*.gz".to_string(),
            database_path: PathBuf::from("logs.db"),
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint_interval: 100_000,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            replace_existing: true,
        }
    }
}

impl IngestConfig {
    /// Load config from a TOML file path. Missing keys take their defaults.
    pub fn from_file(path: &str) -> IngestResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| IngestError::Io(format!("{path}: {e}")))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> IngestResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch_size must be at least 1".into()));
        }
        if self.checkpoint_interval == 0 {
            return Err(IngestError::Config(
                "checkpoint_interval must be at least 1".into(),
            ));
        }
        if self.max_line_bytes == 0 || self.max_record_bytes == 0 {
            return Err(IngestError::Config("size limits must be non-zero".into()));
        }
        if self.input_pattern.is_empty() {
            return Err(IngestError::Config("input_pattern must not be empty".into()));
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_line_bytes: self.max_line_bytes,
            max_record_bytes: self.max_record_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.input_pattern, "*.gz");
        assert_eq!(config.database_path, PathBuf::from("logs.db"));
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.checkpoint_interval, 100_000);
        assert!(config.replace_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialize_partial_config() {
        let config = IngestConfig::from_toml(
            r#"
input_dir = "/var/archive"
batch_size = 250
"#,
        )
        .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/var/archive"));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.checkpoint_interval, 100_000); // default
        assert_eq!(config.input_pattern, "*.gz"); // default
    }

    #[test]
    fn deserialize_full_config() {
        let config = IngestConfig::from_toml(
            r#"
input_dir = "logs"
input_pattern = "server-*.log.gz"
database_path = "out/server.db"
batch_size = 10
checkpoint_interval = 500
max_line_bytes = 4096
max_record_bytes = 65536
replace_existing = false
"#,
        )
        .unwrap();
        assert_eq!(config.input_pattern, "server-*.log.gz");
        assert_eq!(config.checkpoint_interval, 500);
        assert_eq!(config.limits().max_line_bytes, 4096);
        assert!(!config.replace_existing);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = IngestConfig::from_toml("batch_size = 0").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn unknown_type_rejected() {
        let err = IngestConfig::from_toml("batch_size = \"many\"").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
