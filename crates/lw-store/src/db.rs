//! Database lifecycle: open, schema, indexes, and summary statistics.

use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

/// Create (or recreate) the ingestion database at `path` and apply the schema.
///
/// Ingestion is single-threaded, so the pool holds exactly one connection.
pub async fn create(path: &Path, replace_existing: bool) -> StoreResult<SqlitePool> {
    if replace_existing && tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "removed existing database");
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    apply_schema(&pool).await?;
    Ok(pool)
}

/// Open an existing database read-only (query and export).
pub async fn open_read_only(path: &Path) -> StoreResult<SqlitePool> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(StoreError::Io(format!(
            "{}: database does not exist",
            path.display()
        )));
    }
    let options = SqliteConnectOptions::new().filename(path).read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Private in-memory database with the schema applied.
pub async fn in_memory() -> StoreResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    // Every connection to `:memory:` is a separate database; keep one.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    apply_schema(&pool).await?;
    Ok(pool)
}

pub async fn apply_schema(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::raw_sql(include_str!("../migrations/001_logs.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

/// Secondary lookup structures, built once after bulk loading.
pub async fn create_indexes(pool: &SqlitePool) -> StoreResult<()> {
    tracing::info!("creating indexes");
    sqlx::raw_sql(include_str!("../migrations/002_indexes.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

/// Row counts and level distribution of an ingested database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub logs: i64,
    pub stack_traces: i64,
    pub parsing_errors: i64,
    /// Records with level ERROR or CRITICAL.
    pub error_logs: i64,
    /// `(level, count)`, most frequent first; empty levels omitted.
    pub levels: Vec<(String, i64)>,
}

pub async fn stats(pool: &SqlitePool) -> StoreResult<DbStats> {
    let logs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
        .fetch_one(pool)
        .await?;
    let stack_traces: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stack_traces")
        .fetch_one(pool)
        .await?;
    let parsing_errors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parsing_errors")
        .fetch_one(pool)
        .await?;
    let error_logs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM logs WHERE level IN ('ERROR', 'CRITICAL')")
            .fetch_one(pool)
            .await?;
    let levels: Vec<(String, i64)> = sqlx::query_as(
        "SELECT level, COUNT(*) AS count FROM logs
         WHERE level IS NOT NULL AND level != ''
         GROUP BY level ORDER BY count DESC, level",
    )
    .fetch_all(pool)
    .await?;

    Ok(DbStats {
        logs,
        stack_traces,
        parsing_errors,
        error_logs,
        levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creates_three_tables() {
        let pool = in_memory().await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["logs", "parsing_errors", "stack_traces"]);
    }

    #[tokio::test]
    async fn indexes_are_idempotent() {
        let pool = in_memory().await.unwrap();
        create_indexes(&pool).await.unwrap();
        create_indexes(&pool).await.unwrap();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 7);
    }

    #[tokio::test]
    async fn stats_on_empty_database() {
        let pool = in_memory().await.unwrap();
        let s = stats(&pool).await.unwrap();
        assert_eq!(s, DbStats::default());
    }

    #[tokio::test]
    async fn create_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.db");
        {
            let pool = create(&path, true).await.unwrap();
            sqlx::query("INSERT INTO logs (level) VALUES ('INFO')")
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;
        }
        let pool = create(&path, true).await.unwrap();
        assert_eq!(stats(&pool).await.unwrap().logs, 0);
        pool.close().await;

        let pool = create(&path, false).await.unwrap();
        sqlx::query("INSERT INTO logs (level) VALUES ('INFO')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        let pool = create(&path, false).await.unwrap();
        assert_eq!(stats(&pool).await.unwrap().logs, 1);
    }

    #[tokio::test]
    async fn read_only_rejects_writes_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.db");
        assert!(matches!(
            open_read_only(&path).await,
            Err(StoreError::Io(_))
        ));

        create(&path, true).await.unwrap().close().await;
        let pool = open_read_only(&path).await.unwrap();
        let result = sqlx::query("INSERT INTO logs (level) VALUES ('INFO')")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }
}
