use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::debug;

use shared::domain::{canonical_number, HistoryRecord, Operation};

mod memory;

pub use memory::MemoryHistory;

/// Append-only log of evaluated operations.
///
/// Implementations serialize `append` calls, so the returned order of `list`
/// is a linearization of the appends and `date` never decreases along it.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(
        &self,
        operation: Operation,
        a: f64,
        b: f64,
        result: f64,
    ) -> Result<HistoryRecord>;

    /// Full snapshot, oldest first.
    async fn list(&self) -> Result<Vec<HistoryRecord>>;

    /// The newest `limit` records, still oldest first.
    async fn recent(&self, limit: u32) -> Result<Vec<HistoryRecord>>;

    async fn health_check(&self) -> Result<()>;
}

/// SQLite-backed history.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    // Single writer; holds the last assigned timestamp.
    writer: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let last_date = sqlx::query("SELECT date FROM history ORDER BY id DESC LIMIT 1")
            .fetch_optional(&pool)
            .await
            .context("failed to read last history timestamp")?
            .map(|row| row.try_get::<DateTime<Utc>, _>(0))
            .transpose()?;

        debug!(%database_url, ?last_date, "history database ready");
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(last_date)),
        })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl HistoryStore for Storage {
    async fn append(
        &self,
        operation: Operation,
        a: f64,
        b: f64,
        result: f64,
    ) -> Result<HistoryRecord> {
        let (a, b, result) = (
            canonical_number(a),
            canonical_number(b),
            canonical_number(result),
        );
        let mut last_date = self.writer.lock().await;
        let date = next_timestamp(*last_date);

        sqlx::query("INSERT INTO history (operation, a, b, result, date) VALUES (?, ?, ?, ?, ?)")
            .bind(operation.as_str())
            .bind(a)
            .bind(b)
            .bind(result)
            .bind(date)
            .execute(&self.pool)
            .await
            .context("failed to append history record")?;

        *last_date = Some(date);
        Ok(HistoryRecord {
            operation,
            a,
            b,
            result,
            date,
        })
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query("SELECT operation, a, b, result, date FROM history ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("failed to read history")?;
        rows.iter().map(record_from_row).collect()
    }

    async fn recent(&self, limit: u32) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT operation, a, b, result, date FROM (
                 SELECT id, operation, a, b, result, date
                 FROM history
                 ORDER BY id DESC
                 LIMIT ?
             )
             ORDER BY id ASC",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to read recent history")?;
        rows.iter().map(record_from_row).collect()
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

/// Wall clock, clamped so it never runs behind the previous append.
pub(crate) fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

fn record_from_row(row: &SqliteRow) -> Result<HistoryRecord> {
    let token: String = row.try_get("operation")?;
    let operation = token
        .parse::<Operation>()
        .map_err(|e| anyhow!("corrupt history row: {e}"))?;
    Ok(HistoryRecord {
        operation,
        a: row.try_get("a")?,
        b: row.try_get("b")?,
        result: row.try_get("result")?,
        date: row.try_get("date")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
