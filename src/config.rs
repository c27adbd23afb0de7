use std::time::Duration;
use tracing::warn;

use crate::auth::TokenConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_CAS_MAX_ATTEMPTS: u32 = 8;
const DEFAULT_COMPLETION_MAX_RETRIES: u32 = 3;
const DEFAULT_COMPLETION_RETRY_BACKOFF_MS: u64 = 50;

/// Runtime configuration, read from the environment at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Postgres connection string; in-memory stores are used when absent
    pub database_url: Option<String>,
    /// Compare-and-swap attempts per aggregate update before giving up
    pub cas_max_attempts: u32,
    /// Extra attempts the orchestrator makes for each post-completion update
    pub completion_max_retries: u32,
    pub completion_retry_backoff: Duration,
    pub token: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            cas_max_attempts: env_number("CAS_MAX_ATTEMPTS", DEFAULT_CAS_MAX_ATTEMPTS).max(1),
            completion_max_retries: env_number(
                "COMPLETION_MAX_RETRIES",
                DEFAULT_COMPLETION_MAX_RETRIES,
            ),
            completion_retry_backoff: Duration::from_millis(env_number(
                "COMPLETION_RETRY_BACKOFF_MS",
                DEFAULT_COMPLETION_RETRY_BACKOFF_MS,
            )),
            token: TokenConfig::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            cas_max_attempts: DEFAULT_CAS_MAX_ATTEMPTS,
            completion_max_retries: DEFAULT_COMPLETION_MAX_RETRIES,
            completion_retry_backoff: Duration::from_millis(DEFAULT_COMPLETION_RETRY_BACKOFF_MS),
            token: TokenConfig::default(),
        }
    }
}

fn env_number<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_or_default(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or_default<T>(name: &str, raw: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(
            variable = name,
            value = raw,
            default = %default,
            "Invalid numeric configuration value, using default"
        );
        default
    })
}
