//! Startup restore, periodic dumps and the shutdown backup around the
//! in-memory backends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::metrics as telemetry;
use crate::storage::{MemoryStore, Repository, SnapshotFile, StoreError};

/// Upper bound for the final dump on shutdown
pub const BACKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the in-memory store, seeded from the snapshot file when `enabled`.
/// A missing or empty file starts empty; malformed content is an error.
pub async fn restore(snapshot: &SnapshotFile, enabled: bool) -> Result<MemoryStore, StoreError> {
    if !enabled {
        return Ok(MemoryStore::new());
    }

    let metrics = snapshot.read_all().await?;
    info!(
        count = metrics.len(),
        path = %snapshot.path().display(),
        "Restored metrics from snapshot"
    );
    Ok(MemoryStore::with_metrics(metrics))
}

/// Write the full store content to the snapshot file once
pub async fn dump(repository: &dyn Repository, snapshot: &SnapshotFile) -> Result<usize, StoreError> {
    let metrics = repository.get_all().await?;
    let result = snapshot.write_all(&metrics).await;
    telemetry::record_dump(result.is_ok());
    result.map(|_| metrics.len())
}

/// Periodic dump of the store to the snapshot file
pub struct DumpTask {
    repository: Arc<dyn Repository>,
    snapshot: SnapshotFile,
    interval: Duration,
}

impl DumpTask {
    pub fn new(repository: Arc<dyn Repository>, snapshot: SnapshotFile, interval: Duration) -> Self {
        Self {
            repository,
            snapshot,
            interval,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Dump on every tick until `cancel` fires. Failed dumps are logged and
    /// the next tick tries again.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Dump task stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    match dump(self.repository.as_ref(), &self.snapshot).await {
                        Ok(count) => info!(
                            count,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Stored metrics snapshot"
                        ),
                        Err(e) => error!(error = %e, "Periodic dump failed"),
                    }
                }
            }
        }
    }
}

/// Best-effort final dump, bounded by `timeout`. Never fails the caller.
pub async fn backup(repository: &dyn Repository, snapshot: &SnapshotFile, timeout: Duration) {
    match tokio::time::timeout(timeout, dump(repository, snapshot)).await {
        Ok(Ok(count)) => info!(count, path = %snapshot.path().display(), "Shutdown backup written"),
        Ok(Err(e)) => error!(error = %e, "Shutdown backup failed"),
        Err(_) => warn!(timeout_secs = timeout.as_secs(), "Shutdown backup timed out"),
    }
}
