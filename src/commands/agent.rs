use anyhow::Result;
use colored::Colorize;
use metrics_keeper::{agent, config::Config, signals::spawn_shutdown_listener};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Execute the agent command
pub async fn execute(mut cfg: Config, address: Option<String>, workers: Option<usize>) -> Result<()> {
    if let Some(address) = address {
        cfg.agent.server_address = address;
    }
    if let Some(workers) = workers {
        cfg.agent.worker_count = workers;
    }
    metrics_keeper::config::validate_config(&cfg)?;

    println!("{}", "Starting collector agent...".green());
    info!(
        server = %cfg.agent.server_address,
        poll_secs = cfg.agent.poll_interval_seconds,
        report_secs = cfg.agent.report_interval_seconds,
        workers = cfg.agent.worker_count,
        "Starting collector agent"
    );

    let cancel = CancellationToken::new();
    let signal_handle = spawn_shutdown_listener(cancel.clone());

    agent::run(&cfg, cancel.clone()).await?;

    cancel.cancel();
    signal_handle.await?;
    info!("Agent stopped");
    Ok(())
}
