//! logweave: turn gzip-compressed application logs into a queryable SQLite
//! database.

mod args;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries query and export output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "logweave starting");

    match &cli.command {
        Command::Ingest(args) => commands::ingest(cli.db.as_ref(), args).await,
        Command::Query(args) => commands::query(cli.db.as_ref(), args).await,
        Command::Export(args) => commands::export(cli.db.as_ref(), args).await,
    }
}
