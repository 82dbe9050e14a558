//! Counter store implementations.

use std::sync::Arc;

use sheetwise_core::ports::{AtomicCounterStore, RateLimiter};
use sheetwise_core::{AtomicFixedWindowLimiter, FixedWindowLimiter, WindowPolicy};

mod memory;

pub use memory::InMemoryCounterStore;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresCounterStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisCounterConfig, RedisCounterStore};

/// Build the limiter for a store.
///
/// `atomic = false` keeps the read-then-write behaviour, whose ceiling is
/// best-effort under concurrent requests for one key.
pub fn limiter_for<S>(store: Arc<S>, policy: WindowPolicy, atomic: bool) -> Arc<dyn RateLimiter>
where
    S: AtomicCounterStore + 'static,
{
    if atomic {
        Arc::new(AtomicFixedWindowLimiter::new(store, policy))
    } else {
        Arc::new(FixedWindowLimiter::new(store, policy))
    }
}
