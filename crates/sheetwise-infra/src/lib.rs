//! # Sheetwise Infrastructure
//!
//! Concrete implementations of the ports defined in `sheetwise-core`:
//! counter stores for the rate limiter and the outbound tool provider.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external stores, in-memory counters only
//! - `postgres` - PostgreSQL counter store via SeaORM
//! - `redis` - Redis counter store

pub mod counter;
pub mod database;
pub mod provider;

// Re-exports - In-Memory
pub use counter::{InMemoryCounterStore, limiter_for};
pub use database::DatabaseConfig;
pub use provider::{HttpToolProvider, ToolProviderConfig, UnconfiguredToolProvider};

// Re-exports - PostgreSQL
#[cfg(feature = "postgres")]
pub use counter::PostgresCounterStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter::{RedisConfig, RedisCounterConfig, RedisCounterStore};
