use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::queue::DeliveryJob;
use crate::models::{Metric, WireMetric};
use crate::transport::{TransportChain, TransportError, TransportResponse};

/// Where delivery jobs end up
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn deliver(&self, job: &DeliveryJob) -> Result<(), TransportError>;
}

/// HTTP client for the storage server, sending through the transport chain
pub struct MetricClient {
    base_url: String,
    chain: TransportChain,
}

impl MetricClient {
    pub fn new(server_address: &str, chain: TransportChain) -> Self {
        Self {
            base_url: normalize_base_url(server_address),
            chain,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint for single JSON updates
    pub fn update_url(&self) -> String {
        format!("{}/update", self.base_url)
    }

    pub fn updates_url(&self) -> String {
        format!("{}/updates", self.base_url)
    }

    pub async fn update_gauge(&self, name: &str, value: f64) -> Result<(), TransportError> {
        self.send_metric(&self.update_url(), &Metric::gauge(name, value))
            .await
    }

    pub async fn update_counter(&self, name: &str, delta: i64) -> Result<(), TransportError> {
        self.send_metric(&self.update_url(), &Metric::counter(name, delta))
            .await
    }

    /// Send several metrics as one JSON array to `/updates`
    pub async fn batch_update(&self, metrics: &[Metric]) -> Result<(), TransportError> {
        let wire: Vec<WireMetric> = metrics.iter().map(WireMetric::from).collect();
        let body = serde_json::to_vec(&wire)?;
        let response = self.chain.post(&self.updates_url(), body).await?;
        expect_ok(response)
    }

    async fn send_metric(&self, url: &str, metric: &Metric) -> Result<(), TransportError> {
        let body = serde_json::to_vec(&metric.to_wire())?;
        let response = self.chain.post(url, body).await?;
        debug!(metric = %metric, status = %response.status, "Delivered metric");
        expect_ok(response)
    }
}

#[async_trait]
impl MetricSink for MetricClient {
    async fn deliver(&self, job: &DeliveryJob) -> Result<(), TransportError> {
        self.send_metric(&job.destination, &job.metric).await
    }
}

fn expect_ok(response: TransportResponse) -> Result<(), TransportError> {
    if response.status != StatusCode::OK {
        return Err(TransportError::UnexpectedStatus {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }
    Ok(())
}

/// `host:port` becomes `http://host:port`; trailing slashes are dropped
pub fn normalize_base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("localhost:8080"), "http://localhost:8080");
        assert_eq!(normalize_base_url("https://metrics.local/"), "https://metrics.local");
        assert_eq!(normalize_base_url(" http://10.0.0.1:80 "), "http://10.0.0.1:80");
    }
}
