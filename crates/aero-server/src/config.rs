//! Server configuration from environment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Analyses allowed to run at the same time (across projects)
    pub analysis_workers: usize,
    /// Jobs waiting for a free worker before submissions are refused
    pub analysis_queue_capacity: usize,
    /// Upper bound for a single persistence call made by an analysis run
    pub gateway_timeout_ms: u64,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_parse("AERO_PORT", 3000),
            database_path: env::var("AERO_DATABASE_PATH")
                .unwrap_or_else(|_| "data/aero.db".to_string()),
            database_max_connections: env_parse("AERO_DATABASE_MAX_CONNECTIONS", 5).max(1),
            analysis_workers: env_parse("AERO_ANALYSIS_WORKERS", 4).max(1),
            analysis_queue_capacity: env_parse("AERO_ANALYSIS_QUEUE_CAPACITY", 64).max(1),
            gateway_timeout_ms: env_parse("AERO_GATEWAY_TIMEOUT_MS", 10_000).max(1),
            log_json: env::var("AERO_LOG_JSON")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
