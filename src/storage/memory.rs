use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{sort_by_id, Repository, StoreError};
use crate::models::Metric;

/// Process-local store: one map behind one read/write lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a restored snapshot
    pub fn with_metrics(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let map = metrics.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            metrics: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.metrics.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn find(&self, id: &str) -> Result<Metric, StoreError> {
        self.metrics
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_all(&self) -> Result<Vec<Metric>, StoreError> {
        let mut all: Vec<Metric> = self.metrics.read().await.values().cloned().collect();
        sort_by_id(&mut all);
        Ok(all)
    }

    async fn upsert(&self, metric: Metric) -> Result<(), StoreError> {
        self.metrics.write().await.insert(metric.id.clone(), metric);
        Ok(())
    }

    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), StoreError> {
        let mut map = self.metrics.write().await;
        for metric in metrics {
            map.insert(metric.id.clone(), metric);
        }
        Ok(())
    }
}
