use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::AppState;

/// Handle /metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MetricService;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(MetricService::new(Arc::new(MemoryStore::new()))))
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        // Create a handle for testing without initializing global recorder
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let state = state().with_metrics(recorder.handle());

        let response = metrics(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_handler_without_recorder() {
        let response = metrics(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
