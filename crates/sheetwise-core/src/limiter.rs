//! Fixed-window rate limiters.
//!
//! Both limiters share [`WindowPolicy::evaluate`]. They differ only in how
//! the read and the write reach the store:
//!
//! - [`FixedWindowLimiter`] reads, decides, then writes. Two requests for the
//!   same key can both read `limit - 1` and both pass, so the ceiling is
//!   best-effort under concurrency.
//! - [`AtomicFixedWindowLimiter`] delegates the step to
//!   [`AtomicCounterStore::apply_window`] and enforces a hard ceiling.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ClientKey, Decision, Endpoint, RateKey, WindowPolicy, WindowWrite};
use crate::ports::{AtomicCounterStore, CounterStore, RateLimitError, RateLimiter, StoreError};

/// Attempts before a key that keeps changing underneath us is reported as a store fault.
const MAX_ATTEMPTS: u32 = 3;

/// Read-then-write fixed-window limiter.
pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
    policy: WindowPolicy,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>, policy: WindowPolicy) -> Self {
        Self { store, policy }
    }

    /// One get/evaluate/write pass. `Ok(None)` means the write lost a race.
    async fn attempt(
        &self,
        key: &RateKey,
        now: DateTime<Utc>,
    ) -> Result<Option<Decision>, StoreError> {
        let record = self.store.get(key).await?;
        let evaluation = self.policy.evaluate(record.as_ref(), now);

        let written = match evaluation.write {
            WindowWrite::None => Ok(()),
            WindowWrite::Create {
                count,
                window_start,
            } => self.store.create(key, count, window_start).await.map(|_| ()),
            WindowWrite::Update {
                count,
                window_start,
            } => self.store.update(key, count, window_start).await.map(|_| ()),
        };

        match written {
            Ok(()) => Ok(Some(evaluation.decision)),
            // Created by a concurrent request, or swept since the read.
            Err(StoreError::Conflict | StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(
        &self,
        client: &ClientKey,
        endpoint: Endpoint,
        now: DateTime<Utc>,
    ) -> Result<Decision, RateLimitError> {
        let key = RateKey::new(client.clone(), endpoint);

        for _ in 0..MAX_ATTEMPTS {
            if let Some(decision) = self.attempt(&key, now).await? {
                return Ok(decision);
            }
        }

        Err(RateLimitError::StoreUnavailable(format!(
            "record {} changed during {} consecutive attempts",
            key, MAX_ATTEMPTS
        )))
    }

    fn policy(&self) -> &WindowPolicy {
        &self.policy
    }
}

/// Hard-ceiling fixed-window limiter backed by an atomic store primitive.
pub struct AtomicFixedWindowLimiter {
    store: Arc<dyn AtomicCounterStore>,
    policy: WindowPolicy,
}

impl AtomicFixedWindowLimiter {
    pub fn new(store: Arc<dyn AtomicCounterStore>, policy: WindowPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl RateLimiter for AtomicFixedWindowLimiter {
    async fn allow(
        &self,
        client: &ClientKey,
        endpoint: Endpoint,
        now: DateTime<Utc>,
    ) -> Result<Decision, RateLimitError> {
        let key = RateKey::new(client.clone(), endpoint);
        let decision = self.store.apply_window(&key, &self.policy, now).await?;
        Ok(decision)
    }

    fn policy(&self) -> &WindowPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RateRecord;
    use chrono::TimeDelta;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Map-backed store with switches for simulating faults and races.
    #[derive(Default)]
    struct TestStore {
        records: Mutex<HashMap<RateKey, RateRecord>>,
        offline: AtomicBool,
        /// When set, the next `create` finds a record inserted by "someone else".
        race_next_create: AtomicBool,
    }

    impl TestStore {
        fn check_online(&self) -> Result<(), StoreError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }

        fn stored(&self, key: &RateKey) -> Option<RateRecord> {
            self.records.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl CounterStore for TestStore {
        async fn get(&self, key: &RateKey) -> Result<Option<RateRecord>, StoreError> {
            self.check_online()?;
            Ok(self.stored(key))
        }

        async fn create(
            &self,
            key: &RateKey,
            count: u32,
            window_start: DateTime<Utc>,
        ) -> Result<RateRecord, StoreError> {
            self.check_online()?;
            let mut records = self.records.lock().unwrap();
            if self.race_next_create.swap(false, Ordering::SeqCst) {
                records.insert(key.clone(), RateRecord::new(key, 1, window_start));
            }
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
            self.check_online()?;
            let mut records = self.records.lock().unwrap();
            let slot = records.get_mut(key).ok_or(StoreError::NotFound)?;
            *slot = RateRecord::new(key, count, window_start);
            Ok(slot.clone())
        }
    }

    #[async_trait]
    impl AtomicCounterStore for TestStore {
        async fn apply_window(
            &self,
            key: &RateKey,
            policy: &WindowPolicy,
            now: DateTime<Utc>,
        ) -> Result<Decision, StoreError> {
            self.check_online()?;
            let mut records = self.records.lock().unwrap();
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

    fn client(ip: &str) -> ClientKey {
        ClientKey::new(ip)
    }

    fn limiter(store: &Arc<TestStore>) -> FixedWindowLimiter {
        FixedWindowLimiter::new(store.clone(), WindowPolicy::default())
    }

    #[tokio::test]
    async fn test_remaining_counts_down_to_zero() {
        let store = Arc::new(TestStore::default());
        let limiter = limiter(&store);
        let now = Utc::now();
        let ip = client("1.2.3.4");

        for expected in (0..10).rev() {
            let decision = limiter.allow(&ip, Endpoint::AiSearch, now).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected);
        }
    }

    #[tokio::test]
    async fn test_denied_request_does_not_consume_quota() {
        let store = Arc::new(TestStore::default());
        let limiter = limiter(&store);
        let now = Utc::now();
        let ip = client("1.2.3.4");

        for _ in 0..10 {
            limiter.allow(&ip, Endpoint::AiSearch, now).await.unwrap();
        }
        for _ in 0..3 {
            let decision = limiter.allow(&ip, Endpoint::AiSearch, now).await.unwrap();
            assert!(!decision.allowed);
            assert_eq!(decision.remaining, 0);
        }

        let record = store
            .stored(&RateKey::new(ip, Endpoint::AiSearch))
            .unwrap();
        assert_eq!(record.count, 10);
    }

    #[tokio::test]
    async fn test_hourly_scenario() {
        let store = Arc::new(TestStore::default());
        let limiter = limiter(&store);
        let t0 = Utc::now();
        let ip = client("1.2.3.4");

        for _ in 0..10 {
            assert!(limiter.allow(&ip, Endpoint::AiSearch, t0).await.unwrap().allowed);
        }

        let eleventh = limiter.allow(&ip, Endpoint::AiSearch, t0).await.unwrap();
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.remaining, 0);

        let later = t0 + TimeDelta::minutes(61);
        let twelfth = limiter.allow(&ip, Endpoint::AiSearch, later).await.unwrap();
        assert!(twelfth.allowed);
        assert_eq!(twelfth.remaining, 9);

        let record = store
            .stored(&RateKey::new(ip, Endpoint::AiSearch))
            .unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.window_start, later);
    }

    #[tokio::test]
    async fn test_endpoints_are_independent() {
        let store = Arc::new(TestStore::default());
        let limiter = limiter(&store);
        let now = Utc::now();
        let ip = client("1.2.3.4");

        for _ in 0..11 {
            limiter.allow(&ip, Endpoint::FormulaGenerator, now).await.unwrap();
        }

        let other = limiter.allow(&ip, Endpoint::SqlGenerator, now).await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 9);
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let store = Arc::new(TestStore::default());
        let limiter = limiter(&store);
        let now = Utc::now();

        for _ in 0..11 {
            limiter
                .allow(&client("1.2.3.4"), Endpoint::VbaGenerator, now)
                .await
                .unwrap();
        }

        let other = limiter
            .allow(&client("5.6.7.8"), Endpoint::VbaGenerator, now)
            .await
            .unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 9);
    }

    #[tokio::test]
    async fn test_lost_create_race_is_retried() {
        let store = Arc::new(TestStore::default());
        store.race_next_create.store(true, Ordering::SeqCst);
        let limiter = limiter(&store);

        let decision = limiter
            .allow(&client("1.2.3.4"), Endpoint::AiSearch, Utc::now())
            .await
            .unwrap();

        // The concurrent request took the first unit.
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 8);
    }

    #[tokio::test]
    async fn test_store_outage_is_an_error() {
        let store = Arc::new(TestStore::default());
        store.offline.store(true, Ordering::SeqCst);
        let limiter = limiter(&store);

        let result = limiter
            .allow(&client("1.2.3.4"), Endpoint::AiSearch, Utc::now())
            .await;

        assert!(matches!(result, Err(RateLimitError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_atomic_limiter_follows_same_rules() {
        let store = Arc::new(TestStore::default());
        let policy = WindowPolicy::new(3, Duration::from_secs(60)).unwrap();
        let limiter = AtomicFixedWindowLimiter::new(store.clone(), policy);
        let t0 = Utc::now();
        let ip = client("1.2.3.4");

        let remaining: Vec<u32> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(
                    limiter
                        .allow(&ip, Endpoint::DocumentConvert, t0)
                        .await
                        .unwrap()
                        .remaining,
                );
            }
            out
        };
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = limiter.allow(&ip, Endpoint::DocumentConvert, t0).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::from_secs(60));

        let reset = limiter
            .allow(&ip, Endpoint::DocumentConvert, t0 + TimeDelta::seconds(61))
            .await
            .unwrap();
        assert!(reset.allowed);
        assert_eq!(reset.remaining, 2);
        assert_eq!(limiter.policy().limit(), 3);
    }
}
