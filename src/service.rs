use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::metrics as telemetry;
use crate::models::{merge, Metric, MetricKind};
use crate::storage::{Repository, StoreError};

/// Use cases between the HTTP layer and the repository.
///
/// Reading the stored value, merging and writing back happen under one
/// mutex so concurrent counter updates in this process never lose an
/// increment.
pub struct MetricService {
    repository: Arc<dyn Repository>,
    write_lock: Mutex<()>,
}

impl MetricService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            repository,
            write_lock: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Metric `id` of the given kind; a stored metric of another kind counts
    /// as missing
    pub async fn get(&self, kind: MetricKind, id: &str) -> Result<Metric, StoreError> {
        let metric = self.repository.find(id).await?;
        if metric.kind() != kind {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(metric)
    }

    pub async fn get_all(&self) -> Result<Vec<Metric>, StoreError> {
        self.repository.get_all().await
    }

    /// Merge one update into the store and return the stored result
    pub async fn upsert(&self, incoming: Metric) -> Result<Metric, StoreError> {
        let _guard = self.write_lock.lock().await;

        let kind = incoming.kind();
        let merged = self.merge_with_stored(incoming).await?;
        self.repository.upsert(merged.clone()).await?;

        telemetry::record_update(kind);
        Ok(merged)
    }

    /// Fold a batch by id, merge each folded metric once against the store
    /// and write everything with one `batch_upsert`
    pub async fn batch_update(&self, batch: Vec<Metric>) -> Result<Vec<Metric>, StoreError> {
        let folded = fold_batch(batch);
        if folded.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock().await;

        let mut merged = Vec::with_capacity(folded.len());
        for metric in folded {
            merged.push(self.merge_with_stored(metric).await?);
        }
        self.repository.batch_upsert(merged.clone()).await?;

        for metric in &merged {
            telemetry::record_update(metric.kind());
        }
        Ok(merged)
    }

    async fn merge_with_stored(&self, incoming: Metric) -> Result<Metric, StoreError> {
        match self.repository.find(&incoming.id).await {
            Ok(existing) => {
                debug!(id = %incoming.id, "Metric found, merging update");
                Ok(merge(existing, incoming))
            }
            Err(StoreError::NotFound(_)) => {
                debug!(id = %incoming.id, "Metric not found, adding");
                Ok(incoming)
            }
            Err(e) => Err(e),
        }
    }
}

/// Collapse updates sharing an id, keeping first-seen order.
///
/// Counter deltas add up; for gauges the last value folded wins.
pub fn fold_batch(batch: Vec<Metric>) -> Vec<Metric> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut folded: Vec<Metric> = Vec::with_capacity(batch.len());

    for metric in batch {
        match index.get(&metric.id) {
            Some(&slot) => {
                let existing = folded[slot].clone();
                folded[slot] = merge(existing, metric);
            }
            None => {
                index.insert(metric.id.clone(), folded.len());
                folded.push(metric);
            }
        }
    }
    folded
}
