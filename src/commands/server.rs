use anyhow::Result;
use colored::Colorize;
use metrics_keeper::{config::Config, server};
use tracing::info;

/// Execute the server command
///
/// Blocks until a shutdown signal has been handled and the final backup
/// written.
pub async fn execute(mut cfg: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        cfg.server.port = port;
    }
    metrics_keeper::config::validate_config(&cfg)?;

    println!("{}", "Starting metrics server...".green());
    info!(
        host = %cfg.server.host,
        port = cfg.server.port,
        "Starting metrics server"
    );

    server::start_server(cfg).await
}
