//! Subcommand implementations.

use anyhow::Context;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use lw_ingest::{GzipArchiveSource, Ingestor};
use lw_store::{ExportOptions, SqliteSink, db};

use crate::args::{DEFAULT_DB, ExportArgs, IngestArgs, QueryArgs};

fn db_path(db: Option<&PathBuf>) -> &Path {
    db.map(PathBuf::as_path).unwrap_or(Path::new(DEFAULT_DB))
}

pub async fn ingest(db: Option<&PathBuf>, args: &IngestArgs) -> anyhow::Result<()> {
    let config = args.resolve(db)?;
    tracing::info!(
        input_dir = %config.input_dir.display(),
        pattern = %config.input_pattern,
        database = %config.database_path.display(),
        batch_size = config.batch_size,
        checkpoint_interval = config.checkpoint_interval,
        "starting ingestion"
    );

    let pool = db::create(&config.database_path, config.replace_existing)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let source = GzipArchiveSource::new(&config.input_dir, &config.input_pattern);
    let ingestor = Ingestor::new(config)?;

    let mut sink = SqliteSink::new(pool.clone());
    let summary = ingestor.run(&source, &mut sink).await?;
    db::create_indexes(&pool).await?;

    let stats = db::stats(&pool).await?;
    tracing::info!(
        archives = summary.archives.len(),
        failed = summary.failed.len(),
        records = summary.total_records(),
        stack_traces = summary.total_stack_traces(),
        parsing_errors = summary.total_errors(),
        "ingestion complete"
    );
    tracing::info!(
        logs = stats.logs,
        stack_traces = stats.stack_traces,
        parsing_errors = stats.parsing_errors,
        levels = ?stats.levels,
        "database summary"
    );
    for failed in &summary.failed {
        tracing::warn!(archive = %failed.archive, error = %failed.error, "archive not ingested");
    }

    pool.close().await;
    Ok(())
}

pub async fn query(db: Option<&PathBuf>, args: &QueryArgs) -> anyhow::Result<()> {
    let path = db_path(db);
    let pool = db::open_read_only(path).await?;

    let text = match args.statement() {
        Some(sql) => {
            let output = lw_store::query::run_query(&pool, &sql).await?;
            lw_store::query::render_csv(&output)
        }
        None => {
            let mut text = String::new();
            for table in lw_store::query::describe(&pool).await? {
                writeln!(text, "{} ({} rows)", table.name, table.rows)?;
                for column in &table.columns {
                    writeln!(text, "  {} {}", column.name, column.data_type)?;
                }
            }
            text
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

pub async fn export(db: Option<&PathBuf>, args: &ExportArgs) -> anyhow::Result<()> {
    let path = db_path(db);
    let pool = db::open_read_only(path).await?;

    if args.verbose {
        let stats = db::stats(&pool).await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    let options = ExportOptions {
        kind: args.kind,
        limit: args.limit,
        output: args.output.clone(),
        ..ExportOptions::default()
    };
    let report = lw_store::export::export(&pool, &options).await?;
    for file in &report.files {
        println!("{} rows -> {}", file.rows, file.path.display());
    }
    if report.files.is_empty() {
        tracing::warn!(kind = %args.kind, "nothing exported");
    }
    Ok(())
}
