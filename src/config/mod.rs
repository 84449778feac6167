use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Rule dashboard configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "ruledash")]
#[command(about = "Traffic-control rule management service")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "RULEDASH_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false", env = "RULEDASH_LOG_JSON")]
    pub log_json: bool,

    /// Directory of the file-backed rule source (in-memory source if not set)
    #[arg(long, env = "RULEDASH_RULE_SOURCE_DIR")]
    pub rule_source_dir: Option<PathBuf>,

    /// Path to the users YAML file (every caller is a super user if not set)
    #[arg(long, env = "RULEDASH_AUTH_USERS_PATH")]
    pub auth_users_path: Option<PathBuf>,

    /// Timeout in milliseconds for a single rule source read or write
    #[arg(long, default_value = "3000", env = "RULEDASH_SOURCE_TIMEOUT_MS")]
    pub source_timeout_ms: u64,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "RULEDASH_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "RULEDASH_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get rule source timeout as Duration.
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            rule_source_dir: None,
            auth_users_path: None,
            source_timeout_ms: 3000,
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}
