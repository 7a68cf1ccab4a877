use anyhow::Result;
use colored::Colorize;
use metrics_keeper::{config::Config, logging::mask_secret};
use tracing::info;

/// Execute the test command
///
/// The configuration was already loaded and validated by the caller; this
/// prints what the server and agent would run with.
pub fn execute(cfg: &Config) -> Result<()> {
    println!("{}", "✓ Configuration test successful".green());
    println!();

    println!("{}", "Configuration Summary:".bold());
    println!("  {}: {}:{}", "Server".cyan(), cfg.server.host, cfg.server.port);
    println!("  {}: {}", "Log Level".cyan(), cfg.server.log_level);
    println!("  {}: {}", "Log Format".cyan(), cfg.server.log_format);
    println!();

    println!("{}", "Storage:".cyan());
    if cfg.storage.database_url.is_empty() {
        let mode = if cfg.storage.dump_interval_seconds == 0 {
            "synchronous dumps".to_string()
        } else {
            format!("dump every {}s", cfg.storage.dump_interval_seconds)
        };
        println!("    Backend: in-memory ({})", mode);
        println!("    Snapshot: {}", cfg.storage.snapshot_path);
        println!(
            "    Restore on start: {}",
            if cfg.storage.restore_on_start {
                "yes".green()
            } else {
                "no".yellow()
            }
        );
    } else {
        println!("    Backend: SQL ({} connections)", cfg.storage.max_connections);
    }
    println!();

    println!("{}", "Agent:".cyan());
    println!("    Server address: {}", cfg.agent.server_address);
    println!(
        "    Poll / report: {}s / {}s",
        cfg.agent.poll_interval_seconds, cfg.agent.report_interval_seconds
    );
    println!("    Workers: {}", cfg.agent.worker_count);
    println!();

    println!("{}", "Security:".cyan());
    println!("    Signing key: {}", mask_secret(&cfg.security.signing_key));
    println!("    Public key: {}", path_or_unset(&cfg.security.public_key_path));
    println!("    Private key: {}", path_or_unset(&cfg.security.private_key_path));

    info!("Configuration validation completed successfully");
    Ok(())
}

fn path_or_unset(path: &str) -> colored::ColoredString {
    if path.is_empty() {
        "<unset>".dimmed()
    } else {
        path.normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_default_config() {
        assert!(execute(&Config::default()).is_ok());
    }
}
