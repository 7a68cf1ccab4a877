//! Transactional SQL backend on SQLite.
//!
//! Each write runs in a single transaction that deletes and re-inserts every
//! row it touches. Busy, locked and interrupted errors retry the whole
//! transaction on the shared backoff schedule.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Repository, StoreError};
use crate::models::{validate, Metric, WireMetric};
use crate::retry::{RetryError, RetryPolicy};

/// SQLite result codes that describe contention rather than a bad statement:
/// BUSY, LOCKED, INTERRUPT and the extended BUSY_RECOVERY, BUSY_SNAPSHOT,
/// BUSY_TIMEOUT codes.
const TRANSIENT_CODES: [&str; 6] = ["5", "6", "9", "261", "517", "773"];

pub struct SqlStore {
    pool: SqlitePool,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl SqlStore {
    /// Connect, create the database file if needed and run migrations
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        cancel: CancellationToken,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = Self::new(pool, cancel);
        store.migrate().await?;
        Ok(store)
    }

    pub fn new(pool: SqlitePool, cancel: CancellationToken) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
            cancel,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Apply pending migrations; already applied ones are skipped
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        info!("Metrics database migrations completed");
        Ok(())
    }

    async fn with_retry_on<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        match self.retry.run(&self.cancel, is_transient, op).await {
            Ok(value) => Ok(value),
            Err(RetryError::Permanent(e)) => Err(StoreError::Database(e)),
            Err(RetryError::Exhausted { attempts, last }) => Err(StoreError::RetriesExhausted {
                attempts,
                last: last.to_string(),
            }),
            Err(RetryError::Cancelled { .. }) => Err(StoreError::Cancelled),
        }
    }

    async fn write(&self, metrics: &[Metric]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for metric in metrics {
            sqlx::query("DELETE FROM metrics WHERE id = ?")
                .bind(&metric.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO metrics (id, type, delta, value) VALUES (?, ?, ?, ?)")
                .bind(&metric.id)
                .bind(metric.kind().as_str())
                .bind(metric.delta())
                .bind(metric.value())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }
}

/// Whether an error is contention worth retrying the transaction for
pub fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| TRANSIENT_CODES.contains(&code.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

fn metric_from_row(row: &SqliteRow) -> Result<Metric, StoreError> {
    let wire = WireMetric {
        id: row.try_get("id")?,
        kind: row.try_get("type")?,
        delta: row.try_get("delta")?,
        value: row.try_get("value")?,
    };
    Ok(validate(wire)?)
}

#[async_trait]
impl Repository for SqlStore {
    async fn find(&self, id: &str) -> Result<Metric, StoreError> {
        let row = self
            .with_retry_on(|_| {
                sqlx::query("SELECT id, type, delta, value FROM metrics WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
            })
            .await?;

        match row {
            Some(row) => metric_from_row(&row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn get_all(&self) -> Result<Vec<Metric>, StoreError> {
        let rows = self
            .with_retry_on(|_| {
                sqlx::query("SELECT id, type, delta, value FROM metrics ORDER BY id ASC")
                    .fetch_all(&self.pool)
            })
            .await?;

        rows.iter().map(metric_from_row).collect()
    }

    async fn upsert(&self, metric: Metric) -> Result<(), StoreError> {
        let batch = [metric];
        self.with_retry_on(|_| self.write(&batch)).await
    }

    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), StoreError> {
        if metrics.is_empty() {
            return Ok(());
        }
        self.with_retry_on(|_| self.write(&metrics)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
