use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "metrics-keeper", version, about = "Push-based metrics agent and server")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the storage server (default)
    Server {
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the collector agent
    Agent {
        /// Override agent.server_address
        #[arg(short, long)]
        address: Option<String>,

        /// Override agent.worker_count
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Load and validate the configuration, then print a summary
    Test,

    /// Show version information
    Version,
}

impl Cli {
    /// Get the command to execute, defaulting to Server if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Server { port: None })
    }
}
