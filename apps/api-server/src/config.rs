//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use sheetwise_infra::{DatabaseConfig, ToolProviderConfig};

use crate::middleware::rate_limit::{FailurePolicy, GatePolicy};

/// Which counter store backs the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!("unknown counter store '{}'", other)),
        }
    }
}

/// Rate limiter settings shared by every gated endpoint.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window: Duration,
    /// Use the store's atomic primitive for a hard ceiling.
    pub atomic: bool,
    pub gate: GatePolicy,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60 * 60),
            atomic: false,
            gate: GatePolicy::default(),
        }
    }
}

/// Background sweeper settings.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    pub schedule: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub rate_limit: RateLimitSettings,
    pub database: Option<DatabaseConfig>,
    pub provider: ToolProviderConfig,
    pub sweeper: SweeperConfig,
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let store = env::var("COUNTER_STORE")
            .ok()
            .and_then(|value| match value.parse() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!("{}; using in-memory counters", e);
                    None
                }
            })
            .unwrap_or(StoreBackend::Memory);

        let on_store_error = if env_flag("RATE_LIMIT_FAIL_OPEN", false) {
            FailurePolicy::FailOpen
        } else {
            FailurePolicy::FailClosed
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT", 8080),
            store,
            rate_limit: RateLimitSettings {
                max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", 10),
                window: Duration::from_secs(env_parse("RATE_LIMIT_WINDOW_SECS", 3600)),
                atomic: env_flag("RATE_LIMIT_ATOMIC", false),
                gate: GatePolicy { on_store_error },
            },
            database: DatabaseConfig::from_env(),
            provider: ToolProviderConfig::from_env(),
            sweeper: SweeperConfig {
                enabled: env_flag("SWEEPER_ENABLED", true),
                schedule: env::var("SWEEPER_SCHEDULE")
                    .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            },
        }
    }
}
