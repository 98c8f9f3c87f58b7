//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lw_ingest::{IngestConfig, IngestResult};
use lw_store::ExportKind;

pub const DEFAULT_DB: &str = "logs.db";

#[derive(Debug, Parser)]
#[command(name = "logweave")]
#[command(about = "Ingest compressed application logs into SQLite, then query or export them")]
#[command(version)]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse matching archives into a fresh database.
    Ingest(IngestArgs),
    /// Run SQL against the database and print CSV; without SQL, describe the tables.
    Query(QueryArgs),
    /// Export error-focused relations as JSON Lines files.
    Export(ExportArgs),
}

#[derive(Debug, Default, clap::Args)]
pub struct IngestArgs {
    /// TOML file with ingestion settings; flags override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory searched for archives.
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Archive file name pattern (`*` and `?`).
    #[arg(long)]
    pub pattern: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Lines between commits.
    #[arg(long)]
    pub checkpoint_interval: Option<u64>,

    /// Append to an existing database instead of recreating it.
    #[arg(long)]
    pub keep_existing: bool,
}

#[derive(Debug, clap::Args)]
pub struct QueryArgs {
    /// SQL text; words are joined with spaces.
    pub sql: Vec<String>,
}

impl QueryArgs {
    pub fn statement(&self) -> Option<String> {
        let sql = self.sql.join(" ");
        let sql = sql.trim();
        (!sql.is_empty()).then(|| sql.to_string())
    }
}

#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    /// parsing, logs, stack_traces, all or full_db.
    #[arg(long = "type", default_value = "all")]
    pub kind: ExportKind,

    /// Maximum rows per relation.
    #[arg(long)]
    pub limit: Option<i64>,

    /// Output file; only used when a single relation is exported.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print database statistics before exporting.
    #[arg(long, short)]
    pub verbose: bool,
}

impl IngestArgs {
    /// Config file (or defaults) with flag overrides applied, then validated.
    pub fn resolve(&self, db: Option<&PathBuf>) -> IngestResult<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::from_file(&path.to_string_lossy())?,
            None => IngestConfig::default(),
        };
        if let Some(db) = db {
            config.database_path = db.clone();
        }
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.input_pattern = pattern.clone();
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.checkpoint_interval {
            config.checkpoint_interval = n;
        }
        if self.keep_existing {
            config.replace_existing = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use lw_ingest::IngestError;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.toml");
        std::fs::write(
            &path,
            "input_dir = \"/var/log/app\"\nbatch_size = 50\ninput_pattern = \"app-*.gz\"\n",
        )
        .unwrap();

        let args = IngestArgs {
            config: Some(path),
            batch_size: Some(200),
            keep_existing: true,
            ..Default::default()
        };
        let config = args.resolve(Some(&PathBuf::from("out.db"))).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/var/log/app"));
        assert_eq!(config.input_pattern, "app-*.gz");
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.database_path, PathBuf::from("out.db"));
        assert!(!config.replace_existing);
    }

    #[test]
    fn zero_batch_size_flag_rejected() {
        let args = IngestArgs {
            batch_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(args.resolve(None), Err(IngestError::Config(_))));
    }

    #[test]
    fn parse_subcommands() {
        let cli = Cli::try_parse_from(["logweave", "--db", "x.db", "query", "SELECT", "1"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        match cli.command {
            Command::Query(q) => assert_eq!(q.statement().as_deref(), Some("SELECT 1")),
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::try_parse_from(["logweave", "export", "--type", "stack_traces", "--limit", "5"])
            .unwrap();
        match cli.command {
            Command::Export(e) => {
                assert_eq!(e.kind, ExportKind::StackTraces);
                assert_eq!(e.limit, Some(5));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(Cli::try_parse_from(["logweave", "export", "--type", "parquet"]).is_err());
    }

    #[test]
    fn empty_query_means_describe() {
        let q = QueryArgs { sql: vec![] };
        assert_eq!(q.statement(), None);
    }
}
