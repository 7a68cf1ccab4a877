use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{MemoryStore, Repository, SnapshotFile, StoreError};
use crate::metrics as telemetry;
use crate::models::Metric;

/// In-memory store that rewrites its snapshot file after every write.
///
/// A write and the dump that follows it run under one lock, so a dump of an
/// older state can never land after a dump of a newer one.
pub struct FileBackedStore {
    inner: MemoryStore,
    snapshot: SnapshotFile,
    write_lock: Mutex<()>,
}

impl FileBackedStore {
    pub fn new(inner: MemoryStore, snapshot: SnapshotFile) -> Self {
        Self {
            inner,
            snapshot,
            write_lock: Mutex::new(()),
        }
    }

    async fn dump(&self) -> Result<(), StoreError> {
        let all = self.inner.get_all().await?;
        let result = self.snapshot.write_all(&all).await;
        telemetry::record_dump(result.is_ok());
        debug!(count = all.len(), path = %self.snapshot.path().display(), "Synchronous dump");
        result
    }
}

#[async_trait]
impl Repository for FileBackedStore {
    async fn find(&self, id: &str) -> Result<Metric, StoreError> {
        self.inner.find(id).await
    }

    async fn get_all(&self) -> Result<Vec<Metric>, StoreError> {
        self.inner.get_all().await
    }

    async fn upsert(&self, metric: Metric) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.upsert(metric).await?;
        self.dump().await
    }

    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.batch_upsert(metrics).await?;
        self.dump().await
    }
}
