//! Counter store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Decision, RateKey, RateRecord, WindowPolicy};

/// Durable record of `(client, endpoint) -> {count, window_start}`.
///
/// The store holds no rate-limiting logic. It never overwrites on `create`
/// and never inserts on `update`; callers compose the two after a `get`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch the record for `key`. Never mutates state.
    async fn get(&self, key: &RateKey) -> Result<Option<RateRecord>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Conflict`] if one exists.
    async fn create(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError>;

    /// Overwrite an existing record. Fails with [`StoreError::NotFound`] if absent.
    async fn update(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError>;
}

/// Stores that can run a whole fixed-window step as one atomic operation.
#[async_trait]
pub trait AtomicCounterStore: CounterStore {
    /// Evaluate `policy` against the stored record and persist the result
    /// without letting a concurrent caller interleave.
    async fn apply_window(
        &self,
        key: &RateKey,
        policy: &WindowPolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError>;
}

/// Stores that can drop records whose window started before a cutoff.
#[async_trait]
pub trait CounterSweep: Send + Sync {
    /// Returns the number of records removed.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Counter store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Rate record already exists")]
    Conflict,

    #[error("Rate record not found")]
    NotFound,

    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}
