//! Application state - shared across all handlers.

use std::sync::Arc;

use sheetwise_core::ports::{CounterSweep, ProviderError, RateLimiter, ToolProvider};
use sheetwise_core::{DomainError, WindowPolicy};
use sheetwise_infra::{
    HttpToolProvider, InMemoryCounterStore, UnconfiguredToolProvider, limiter_for,
};

use crate::config::{AppConfig, StoreBackend};
use crate::middleware::rate_limit::GatePolicy;

/// Reasons the server cannot be wired at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid rate limit settings: {0}")]
    Policy(#[from] DomainError),

    #[error("Tool provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// One limiter shared by every gated endpoint.
    pub limiter: Arc<dyn RateLimiter>,
    pub provider: Arc<dyn ToolProvider>,
    /// Present when the counter store supports purging stale records.
    pub sweeper: Option<Arc<dyn CounterSweep>>,
    pub store_backend: &'static str,
    pub gate: GatePolicy,
}

/// Limiter plus the optional sweep capability of the store behind it.
struct WiredStore {
    limiter: Arc<dyn RateLimiter>,
    sweeper: Option<Arc<dyn CounterSweep>>,
    backend: &'static str,
}

fn memory_store(policy: WindowPolicy, atomic: bool) -> WiredStore {
    let store = Arc::new(InMemoryCounterStore::new());
    WiredStore {
        limiter: limiter_for(store.clone(), policy, atomic),
        sweeper: Some(store),
        backend: "memory",
    }
}

#[cfg(feature = "postgres")]
async fn postgres_store(config: &AppConfig, policy: WindowPolicy) -> Option<WiredStore> {
    use sheetwise_infra::PostgresCounterStore;

    let Some(db_config) = config.database.as_ref() else {
        tracing::warn!("COUNTER_STORE=postgres but DATABASE_URL is not set");
        return None;
    };

    match sheetwise_infra::database::connect(db_config).await {
        Ok(conn) => {
            let store = Arc::new(PostgresCounterStore::new(conn));
            Some(WiredStore {
                limiter: limiter_for(store.clone(), policy, config.rate_limit.atomic),
                sweeper: Some(store),
                backend: "postgres",
            })
        }
        Err(e) => {
            tracing::error!("Failed to connect to counter database: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn postgres_store(_config: &AppConfig, _policy: WindowPolicy) -> Option<WiredStore> {
    tracing::warn!("Built without the postgres feature");
    None
}

#[cfg(feature = "redis")]
async fn redis_store(config: &AppConfig, policy: WindowPolicy) -> Option<WiredStore> {
    use sheetwise_infra::{RedisCounterConfig, RedisCounterStore};

    // Keys must outlive the window they describe.
    let record_ttl = config.rate_limit.window * 2;

    match RedisCounterStore::new(RedisCounterConfig::from_env(record_ttl)).await {
        Ok(store) => Some(WiredStore {
            limiter: limiter_for(Arc::new(store), policy, config.rate_limit.atomic),
            sweeper: None,
            backend: "redis",
        }),
        Err(e) => {
            tracing::error!("Failed to connect to Redis counter store: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn redis_store(_config: &AppConfig, _policy: WindowPolicy) -> Option<WiredStore> {
    tracing::warn!("Built without the redis feature");
    None
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let policy = WindowPolicy::new(config.rate_limit.max_requests, config.rate_limit.window)?;
        let atomic = config.rate_limit.atomic;

        let wired = match config.store {
            StoreBackend::Memory => None,
            StoreBackend::Postgres => postgres_store(config, policy).await,
            StoreBackend::Redis => redis_store(config, policy).await,
        };

        let wired = wired.unwrap_or_else(|| {
            if config.store != StoreBackend::Memory {
                tracing::warn!("Falling back to in-memory counters (per-process, not durable)");
            }
            memory_store(policy, atomic)
        });

        let provider: Arc<dyn ToolProvider> = match &config.provider.url {
            Some(url) => {
                Arc::new(HttpToolProvider::new(
                    url.clone(),
                    config.provider.api_key.clone(),
                    config.provider.timeout,
                )?)
            }
            None => {
                tracing::warn!("TOOL_PROVIDER_URL not set. Tool endpoints will answer 500.");
                Arc::new(UnconfiguredToolProvider)
            }
        };

        tracing::info!(
            counter_store = wired.backend,
            limit = policy.limit(),
            window_secs = policy.window().as_secs(),
            atomic,
            fail_policy = ?config.rate_limit.gate.on_store_error,
            "Application state initialized"
        );

        Ok(Self {
            limiter: wired.limiter,
            provider,
            sweeper: wired.sweeper,
            store_backend: wired.backend,
            gate: config.rate_limit.gate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use sheetwise_core::{ClientKey, Endpoint};
    use sheetwise_infra::ToolProviderConfig;

    use crate::config::{RateLimitSettings, SweeperConfig};

    fn config(store: StoreBackend, max_requests: u32) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            store,
            rate_limit: RateLimitSettings {
                max_requests,
                ..RateLimitSettings::default()
            },
            database: None,
            provider: ToolProviderConfig {
                url: None,
                api_key: None,
                timeout: Duration::from_secs(1),
            },
            sweeper: SweeperConfig {
                enabled: false,
                schedule: "0 0 * * * *".to_string(),
            },
        }
    }

    #[actix_rt::test]
    async fn test_memory_store_is_wired_with_sweeper() {
        let state = AppState::new(&config(StoreBackend::Memory, 3)).await.unwrap();

        assert_eq!(state.store_backend, "memory");
        assert!(state.sweeper.is_some());
        assert_eq!(state.limiter.policy().limit(), 3);
    }

    #[actix_rt::test]
    async fn test_postgres_without_database_falls_back_to_memory() {
        let state = AppState::new(&config(StoreBackend::Postgres, 10)).await.unwrap();

        assert_eq!(state.store_backend, "memory");
        let decision = state
            .limiter
            .allow(&ClientKey::new("1.2.3.4"), Endpoint::AiSearch, Utc::now())
            .await
            .unwrap();
        assert_eq!(decision.remaining, 9);
    }

    #[actix_rt::test]
    async fn test_zero_limit_is_a_policy_error() {
        let err = AppState::new(&config(StoreBackend::Memory, 0))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StartupError::Policy(DomainError::InvalidPolicy(_))));
    }

    #[test]
    fn test_provider_failure_is_not_a_policy_error() {
        let err: StartupError = ProviderError::Upstream("builder error".to_string()).into();

        assert!(matches!(err, StartupError::Provider(_)));
        assert_eq!(
            err.to_string(),
            "Tool provider setup failed: Upstream provider failed: builder error"
        );
    }
}
