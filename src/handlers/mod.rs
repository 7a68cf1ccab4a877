pub mod health;
pub mod metrics_handler;
pub mod updates;
pub mod values;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::service::MetricService;

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricService>,
    /// Present when the server installed the Prometheus recorder
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: Arc<MetricService>) -> Self {
        Self {
            service,
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
