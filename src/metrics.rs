use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::models::MetricKind;

/// Install the Prometheus recorder for the process.
///
/// Fails if a recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

fn init_metric_descriptions() {
    describe_counter!("keeper_updates_total", "Metric updates written to the store");
    describe_counter!(
        "keeper_rejected_total",
        "Requests rejected before reaching the store"
    );
    describe_counter!("keeper_dumps_total", "Snapshot dumps by outcome");
    describe_counter!("agent_deliveries_total", "Agent deliveries by outcome");
    describe_gauge!("keeper_info", "Build information");

    gauge!("keeper_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_update(kind: MetricKind) {
    counter!("keeper_updates_total", "kind" => kind.as_str()).increment(1);
}

/// Record a rejected request (`validation`, `integrity`, `not_found`)
pub fn record_rejected(reason: &'static str) {
    counter!("keeper_rejected_total", "reason" => reason).increment(1);
}

pub fn record_dump(success: bool) {
    counter!("keeper_dumps_total", "result" => outcome(success)).increment(1);
}

pub fn record_delivery(success: bool) {
    counter!("agent_deliveries_total", "result" => outcome(success)).increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_update(MetricKind::Counter);
            record_update(MetricKind::Counter);
            record_rejected("integrity");
            record_dump(false);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"keeper_updates_total{kind="counter"} 2"#));
        assert!(rendered.contains(r#"keeper_rejected_total{reason="integrity"} 1"#));
        assert!(rendered.contains(r#"keeper_dumps_total{result="error"} 1"#));
    }
}
