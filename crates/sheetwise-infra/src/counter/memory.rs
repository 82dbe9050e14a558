//! In-memory counter store - used when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use sheetwise_core::domain::WindowWrite;
use sheetwise_core::ports::{AtomicCounterStore, CounterStore, CounterSweep, StoreError};
use sheetwise_core::{Decision, RateKey, RateRecord, WindowPolicy};

/// In-memory counter store using a HashMap behind an async RwLock.
///
/// Note: Counters are per-process and lost on restart.
pub struct InMemoryCounterStore {
    records: RwLock<HashMap<RateKey, RateRecord>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &RateKey) -> Result<Option<RateRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn create(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Err(StoreError::Conflict);
        }

        let record = RateRecord::new(key, count, window_start);
        records.insert(key.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError> {
        let mut records = self.records.write().await;
        let slot = records.get_mut(key).ok_or(StoreError::NotFound)?;
        slot.count = count;
        slot.window_start = window_start;
        Ok(slot.clone())
    }
}

#[async_trait]
impl AtomicCounterStore for InMemoryCounterStore {
    async fn apply_window(
        &self,
        key: &RateKey,
        policy: &WindowPolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        // Read and write under one write lock.
        let mut records = self.records.write().await;
        let evaluation = policy.evaluate(records.get(key), now);

        match evaluation.write {
            WindowWrite::None => {}
            WindowWrite::Create {
                count,
                window_start,
            }
            | WindowWrite::Update {
                count,
                window_start,
            } => {
                records.insert(key.clone(), RateRecord::new(key, count, window_start));
            }
        }

        Ok(evaluation.decision)
    }
}

#[async_trait]
impl CounterSweep for InMemoryCounterStore {
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.window_start >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeDelta;
    use sheetwise_core::ports::RateLimiter;
    use sheetwise_core::{AtomicFixedWindowLimiter, ClientKey, Endpoint};

    fn key(ip: &str) -> RateKey {
        RateKey::new(ClientKey::new(ip), Endpoint::FormulaGenerator)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryCounterStore::new();
        let now = Utc::now();

        store.create(&key("1.2.3.4"), 1, now).await.unwrap();

        let record = store.get(&key("1.2.3.4")).await.unwrap().unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.window_start, now);
        assert_eq!(record.key(), key("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let store = InMemoryCounterStore::new();
        let now = Utc::now();
        store.create(&key("1.2.3.4"), 4, now).await.unwrap();

        let err = store.create(&key("1.2.3.4"), 1, now).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.get(&key("1.2.3.4")).await.unwrap().unwrap().count, 4);
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = InMemoryCounterStore::new();

        let err = store.update(&key("1.2.3.4"), 2, Utc::now()).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let store = InMemoryCounterStore::new();
        let start = Utc::now();
        let later = start + TimeDelta::minutes(90);
        store.create(&key("1.2.3.4"), 7, start).await.unwrap();

        store.update(&key("1.2.3.4"), 1, later).await.unwrap();

        let record = store.get(&key("1.2.3.4")).await.unwrap().unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.window_start, later);
    }

    #[tokio::test]
    async fn test_get_does_not_mutate() {
        let store = InMemoryCounterStore::new();
        let now = Utc::now();
        store.create(&key("1.2.3.4"), 3, now).await.unwrap();

        for _ in 0..5 {
            store.get(&key("1.2.3.4")).await.unwrap();
            store.get(&key("5.6.7.8")).await.unwrap();
        }

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&key("1.2.3.4")).await.unwrap().unwrap().count, 3);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let store = InMemoryCounterStore::new();
        let now = Utc::now();
        store
            .create(&key("1.1.1.1"), 1, now - TimeDelta::hours(5))
            .await
            .unwrap();
        store.create(&key("2.2.2.2"), 1, now).await.unwrap();

        let removed = store.purge_stale(now - TimeDelta::hours(2)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.get(&key("1.1.1.1")).await.unwrap().is_none());
        assert!(store.get(&key("2.2.2.2")).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_atomic_limiter_holds_ceiling_under_concurrency() {
        let store = Arc::new(InMemoryCounterStore::new());
        let policy = WindowPolicy::new(10, Duration::from_secs(3600)).unwrap();
        let limiter = Arc::new(AtomicFixedWindowLimiter::new(store.clone(), policy));
        let now = Utc::now();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter
                        .allow(&ClientKey::new("1.2.3.4"), Endpoint::AiSearch, now)
                        .await
                        .unwrap()
                        .allowed
                })
            })
            .collect();

        let allowed = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|res| *res.as_ref().unwrap())
            .count();

        assert_eq!(allowed, 10);
        let record = store
            .get(&RateKey::new(ClientKey::new("1.2.3.4"), Endpoint::AiSearch))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.count, 10);
    }
}
