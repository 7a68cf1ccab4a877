//! Metric persistence.
//!
//! All backends implement [`Repository`] and store values as given; merging
//! with the previous value is the service layer's job. The server picks one
//! backend at startup:
//!
//! - [`SqlStore`] when a database URL is configured
//! - [`FileBackedStore`] when the dump interval is zero (dump after every write)
//! - [`MemoryStore`] otherwise, with periodic dumps driven by
//!   [`crate::durability::DumpTask`]

pub mod file_backed;
pub mod memory;
pub mod snapshot;
pub mod sql;

pub use file_backed::FileBackedStore;
pub use memory::MemoryStore;
pub use snapshot::SnapshotFile;
pub use sql::SqlStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Metric, MetricError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metric '{0}' not found")]
    NotFound(String),

    #[error("snapshot file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored metric: {0}")]
    InvalidMetric(#[from] MetricError),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },

    #[error("operation cancelled")]
    Cancelled,
}

/// Storage contract shared by every backend
#[async_trait]
pub trait Repository: Send + Sync {
    /// Look up one metric by id
    async fn find(&self, id: &str) -> Result<Metric, StoreError>;

    /// Every stored metric, sorted by id
    async fn get_all(&self) -> Result<Vec<Metric>, StoreError>;

    /// Insert or replace one metric
    async fn upsert(&self, metric: Metric) -> Result<(), StoreError>;

    /// Insert or replace several metrics as one unit
    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), StoreError>;

    /// Liveness of the underlying storage
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn sort_by_id(metrics: &mut [Metric]) {
    metrics.sort_by(|a, b| a.id.cmp(&b.id));
}

/// Behaviour every backend must share, run against each of them in tests
#[cfg(test)]
pub(crate) mod contract {
    use super::*;

    pub async fn find_missing_is_not_found(repo: &dyn Repository) {
        assert!(matches!(repo.find("Nope").await, Err(StoreError::NotFound(id)) if id == "Nope"));
    }

    pub async fn upsert_replaces_value(repo: &dyn Repository) {
        repo.upsert(Metric::gauge("Alloc", 100.0)).await.unwrap();
        repo.upsert(Metric::gauge("Alloc", 55.6)).await.unwrap();
        assert_eq!(repo.find("Alloc").await.unwrap(), Metric::gauge("Alloc", 55.6));

        repo.upsert(Metric::counter("Alloc", 3)).await.unwrap();
        assert_eq!(repo.find("Alloc").await.unwrap(), Metric::counter("Alloc", 3));
    }

    pub async fn batch_upsert_and_sorted_get_all(repo: &dyn Repository) {
        repo.batch_upsert(vec![
            Metric::gauge("Zeta", 1.5),
            Metric::counter("PollCount", 7),
            Metric::gauge("Alpha", -2.0),
        ])
        .await
        .unwrap();

        let all = repo.get_all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["Alpha", "PollCount", "Zeta"]);
        assert_eq!(all[1], Metric::counter("PollCount", 7));
    }

    pub async fn empty_batch_is_noop(repo: &dyn Repository) {
        repo.batch_upsert(Vec::new()).await.unwrap();
        assert!(repo.get_all().await.unwrap().is_empty());
        assert!(repo.ping().await.is_ok());
    }
}
