use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: String,
    /// 0 dumps synchronously after every write
    pub dump_interval_seconds: u64,
    pub restore_on_start: bool,
    /// Non-empty selects the SQL backend
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "metrics-snapshot.json".to_string(),
            dump_interval_seconds: 300,
            restore_on_start: true,
            database_url: String::new(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server_address: String,
    pub poll_interval_seconds: u64,
    pub report_interval_seconds: u64,
    pub worker_count: usize,
    pub request_timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".to_string(),
            poll_interval_seconds: 2,
            report_interval_seconds: 10,
            worker_count: 4,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared HMAC key; empty disables signing
    pub signing_key: String,
    /// Agent side: RSA public key PEM
    pub public_key_path: String,
    /// Server side: RSA private key PEM
    pub private_key_path: String,
}

/// Load configuration from `path` (optional) layered with
/// `METRICS_KEEPER__SECTION__KEY` environment variables
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("METRICS_KEEPER").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        anyhow::bail!("Server port must be greater than 0");
    }

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!(
            "Invalid log format '{}': expected 'text' or 'json'",
            cfg.server.log_format
        );
    }

    if cfg.agent.poll_interval_seconds == 0 {
        anyhow::bail!("Agent poll interval must be greater than 0");
    }

    if cfg.agent.report_interval_seconds == 0 {
        anyhow::bail!("Agent report interval must be greater than 0");
    }

    if cfg.agent.worker_count == 0 {
        anyhow::bail!("Agent worker count must be greater than 0");
    }

    if cfg.storage.database_url.is_empty() && cfg.storage.snapshot_path.is_empty() {
        anyhow::bail!("Either storage.database_url or storage.snapshot_path must be set");
    }

    if !cfg.storage.database_url.is_empty() && cfg.storage.max_connections == 0 {
        anyhow::bail!("Database max_connections must be greater than 0");
    }

    Ok(())
}
