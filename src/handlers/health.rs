use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use super::AppState;
use crate::error::AppError;

/// Static liveness check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Storage connectivity check
pub async fn ping(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.service.repository().ping().await?;
    Ok("pong")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MetricService;
    use crate::storage::{MemoryStore, Repository, StoreError};
    use crate::models::Metric;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::Arc;

    struct DownStore;

    #[async_trait]
    impl Repository for DownStore {
        async fn find(&self, id: &str) -> Result<Metric, StoreError> {
            Err(StoreError::NotFound(id.to_string()))
        }
        async fn get_all(&self) -> Result<Vec<Metric>, StoreError> {
            Ok(Vec::new())
        }
        async fn upsert(&self, _metric: Metric) -> Result<(), StoreError> {
            Ok(())
        }
        async fn batch_upsert(&self, _metrics: Vec<Metric>) -> Result<(), StoreError> {
            Ok(())
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn test_ping_ok() {
        let state = AppState::new(Arc::new(MetricService::new(Arc::new(MemoryStore::new()))));
        assert_eq!(ping(State(state)).await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_ping_failure_is_500() {
        let state = AppState::new(Arc::new(MetricService::new(Arc::new(DownStore))));
        let response = ping(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
