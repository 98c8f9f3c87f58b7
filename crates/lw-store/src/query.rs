//! Ad-hoc SQL over an ingested database, rendered as CSV.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, SqlitePool, TypeInfo, ValueRef};

use crate::error::{StoreError, StoreResult};

/// Result set of an ad-hoc query with every cell rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    /// `None` is SQL NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

/// Run one SQL statement and collect its rows.
pub async fn run_query(pool: &SqlitePool, sql: &str) -> StoreResult<QueryOutput> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(StoreError::InvalidQuery("empty query".into()));
    }

    let rows = sqlx::query(sql).fetch_all(pool).await?;

    let columns = match rows.first() {
        Some(first) => first.columns().iter().map(|c| c.name().to_string()).collect(),
        None => pool
            .describe(sql)
            .await?
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(row.len());
        for i in 0..row.len() {
            cells.push(cell(row, i)?);
        }
        out.push(cells);
    }

    tracing::debug!(rows = out.len(), "query complete");
    Ok(QueryOutput { columns, rows: out })
}

// SQLite is dynamically typed, so dispatch on the value's storage class.
fn cell(row: &SqliteRow, i: usize) -> StoreResult<Option<String>> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(None);
    }
    let storage = raw.type_info().name().to_string();
    let text = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(i)?.to_string(),
        "REAL" => row.try_get_unchecked::<f64, _>(i)?.to_string(),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
            format!("<{} bytes>", bytes.len())
        }
        _ => row.try_get_unchecked::<String, _>(i)?,
    };
    Ok(Some(text))
}

/// Render as CSV: header line, then one line per row. NULL is an empty field.
pub fn render_csv(output: &QueryOutput) -> String {
    let mut csv = String::new();
    push_line(&mut csv, output.columns.iter().map(String::as_str));
    for row in &output.rows {
        push_line(&mut csv, row.iter().map(|c| c.as_deref().unwrap_or("")));
    }
    csv
}

fn push_line<'a>(csv: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            csv.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            csv.push('"');
            csv.push_str(&field.replace('"', "\"\""));
            csv.push('"');
        } else {
            csv.push_str(field);
        }
    }
    csv.push('\n');
}

// ── Schema description ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// One user table with its columns and row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: i64,
}

pub async fn describe(pool: &SqlitePool) -> StoreResult<Vec<TableInfo>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let columns: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
                .bind(&name)
                .fetch_all(pool)
                .await?;
        let rows: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            quote_ident(&name)
        ))
        .fetch_one(pool)
        .await?;
        tables.push(TableInfo {
            columns: columns
                .into_iter()
                .map(|(name, data_type)| ColumnInfo { name, data_type })
                .collect(),
            name,
            rows,
        });
    }
    Ok(tables)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
