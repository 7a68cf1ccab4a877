//! Collector agent: samples host statistics on the poll period and pushes
//! them to the server on the report period through a bounded worker pool.

pub mod client;
pub mod collector;
pub mod queue;
pub mod sampler;

pub use client::{MetricClient, MetricSink};
pub use collector::{Collector, CollectorSettings};
pub use queue::{DeliveryJob, JobQueue, JobReceiver};
pub use sampler::{SampleSource, StaticSampler, SystemSampler};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::logging::mask_secret;
use crate::retry::RetryPolicy;
use crate::security::{Encrypter, Signer};
use crate::transport::{ChainOptions, TransportChain};

/// Build the HTTP client and its transport chain from configuration.
///
/// Unreadable key material is a startup error.
pub fn build_client(config: &Config, cancel: CancellationToken) -> anyhow::Result<MetricClient> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.agent.request_timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let signer = if config.security.signing_key.is_empty() {
        None
    } else {
        info!(key = %mask_secret(&config.security.signing_key), "Request signing enabled");
        Some(Signer::new(&config.security.signing_key))
    };

    let encrypter = if config.security.public_key_path.is_empty() {
        None
    } else {
        info!(path = %config.security.public_key_path, "Request encryption enabled");
        Some(
            Encrypter::from_pem_file(&config.security.public_key_path)
                .context("Failed to load RSA public key")?,
        )
    };

    let chain = TransportChain::new(
        http,
        ChainOptions {
            signer,
            encrypter,
            retry: RetryPolicy::default(),
        },
        cancel,
    );
    info!(interceptors = ?chain.interceptor_names(), "Transport chain ready");

    Ok(MetricClient::new(&config.agent.server_address, chain))
}

/// Run the collector against the configured server until `cancel` fires
pub async fn run(config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let client = Arc::new(build_client(config, cancel.clone())?);

    let settings = CollectorSettings {
        poll_interval: Duration::from_secs(config.agent.poll_interval_seconds),
        report_interval: Duration::from_secs(config.agent.report_interval_seconds),
        worker_count: config.agent.worker_count,
        destination: client.update_url(),
    };

    Collector::new(settings, Box::new(SystemSampler::new()), client)
        .run(cancel)
        .await;
    Ok(())
}
