use anyhow::Result;
use clap::Parser;
use std::path::Path;

mod cli;
mod commands;

use metrics_keeper::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.get_command() {
        cli::Commands::Server { port } => {
            let cfg = load(&args.config)?;
            commands::server::execute(cfg, port).await?;
        }
        cli::Commands::Agent { address, workers } => {
            let cfg = load(&args.config)?;
            commands::agent::execute(cfg, address, workers).await?;
        }
        cli::Commands::Test => {
            let cfg = load(&args.config)?;
            commands::test::execute(&cfg)?;
        }
        cli::Commands::Version => {
            println!("metrics-keeper v{}", env!("CARGO_PKG_VERSION"));
            println!("Rust {}", env!("CARGO_PKG_RUST_VERSION"));
        }
    }

    Ok(())
}

/// Load configuration, then initialize logging from it
fn load(path: &Path) -> Result<config::Config> {
    let cfg = config::load_config(path)?;
    init_tracing(&cfg.server.log_level, &cfg.server.log_format);
    Ok(cfg)
}
