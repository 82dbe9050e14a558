//! Redis counter store.
//!
//! Each record is a hash at `<prefix>:<endpoint>:<client>` holding `count`
//! and `window_start_ms`. Keys carry a TTL so abandoned counters expire on
//! their own; there is no sweep for this backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use sheetwise_core::ports::{AtomicCounterStore, CounterStore, StoreError};
use sheetwise_core::{Decision, RateKey, RateRecord, WindowPolicy};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

/// Redis counter store configuration.
#[derive(Debug, Clone)]
pub struct RedisCounterConfig {
    pub redis: RedisConfig,
    /// Key prefix for counter keys
    pub key_prefix: String,
    /// Expiry applied on every write
    pub record_ttl: Duration,
}

impl Default for RedisCounterConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: "ratelimit".to_string(),
            record_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl RedisCounterConfig {
    /// `record_ttl` should outlive the limiter window, otherwise active
    /// windows are forgotten early.
    pub fn from_env(record_ttl: Duration) -> Self {
        Self {
            redis: RedisConfig::from_env(),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "ratelimit".to_string()),
            record_ttl,
        }
    }
}

// Returns 1 if created, 0 if the key already exists.
const CREATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'count', ARGV[1], 'window_start_ms', ARGV[2])
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return 1
"#;

// Returns 1 if updated, 0 if the key does not exist.
const UPDATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[1], 'count', ARGV[1], 'window_start_ms', ARGV[2])
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return 1
"#;

// Same rules as WindowPolicy::evaluate, run server-side.
// Returns {allowed, count}.
const WINDOW_SCRIPT: &str = r#"
local now_ms = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local window_ms = tonumber(ARGV[3])
local ttl_ms = tonumber(ARGV[4])

local count = tonumber(redis.call('HGET', KEYS[1], 'count'))
local start = tonumber(redis.call('HGET', KEYS[1], 'window_start_ms'))

if count == nil or start == nil or start < now_ms - window_ms then
    redis.call('HSET', KEYS[1], 'count', 1, 'window_start_ms', now_ms)
    redis.call('PEXPIRE', KEYS[1], ttl_ms)
    return {1, 1}
end

if count >= limit then
    return {0, count}
end

count = count + 1
redis.call('HSET', KEYS[1], 'count', count)
redis.call('PEXPIRE', KEYS[1], ttl_ms)
return {1, count}
"#;

/// Redis-backed counter store.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    config: RedisCounterConfig,
    create_script: Script,
    update_script: Script,
    window_script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: RedisCounterConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.redis.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Unavailable("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(url = %config.redis.url, "Connected to Redis counter store");

        Ok(Self {
            conn,
            config,
            create_script: Script::new(CREATE_SCRIPT),
            update_script: Script::new(UPDATE_SCRIPT),
            window_script: Script::new(WINDOW_SCRIPT),
        })
    }

    fn make_key(&self, key: &RateKey) -> String {
        redis_key(&self.config.key_prefix, key)
    }

    fn ttl_ms(&self) -> u64 {
        self.config.record_ttl.as_millis() as u64
    }

    async fn write(
        &self,
        script: &Script,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let written: i64 = script
            .key(self.make_key(key))
            .arg(count)
            .arg(window_start.timestamp_millis())
            .arg(self.ttl_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(written == 1)
    }
}

fn redis_key(prefix: &str, key: &RateKey) -> String {
    format!("{}:{}:{}", prefix, key.endpoint, key.client)
}

/// Hash fields hold epoch milliseconds.
fn hash_instant(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

fn parse_record(key: &RateKey, fields: &HashMap<String, String>) -> Option<RateRecord> {
    let count = fields.get("count")?.parse::<u32>().ok()?;
    let start_ms = fields.get("window_start_ms")?.parse::<i64>().ok()?;
    let window_start = Utc.timestamp_millis_opt(start_ms).single()?;
    Some(RateRecord::new(key, count, window_start))
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &RateKey) -> Result<Option<RateRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.make_key(key))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if fields.is_empty() {
            return Ok(None);
        }

        match parse_record(key, &fields) {
            Some(record) => Ok(Some(record)),
            None => Err(StoreError::Unavailable(format!(
                "malformed counter hash for {}",
                key
            ))),
        }
    }

    async fn create(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError> {
        let window_start = hash_instant(window_start);
        if !self.write(&self.create_script, key, count, window_start).await? {
            return Err(StoreError::Conflict);
        }
        Ok(RateRecord::new(key, count, window_start))
    }

    async fn update(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError> {
        let window_start = hash_instant(window_start);
        if !self.write(&self.update_script, key, count, window_start).await? {
            return Err(StoreError::NotFound);
        }
        Ok(RateRecord::new(key, count, window_start))
    }
}

#[async_trait]
impl AtomicCounterStore for RedisCounterStore {
    async fn apply_window(
        &self,
        key: &RateKey,
        policy: &WindowPolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let mut conn = self.conn.clone();
        let result: Vec<i64> = self
            .window_script
            .key(self.make_key(key))
            .arg(now.timestamp_millis())
            .arg(policy.limit())
            .arg(policy.window().as_millis() as u64)
            .arg(self.ttl_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let allowed = result.first().copied().unwrap_or(0) == 1;
        let count = result.get(1).copied().unwrap_or(0).max(0) as u32;

        Ok(Decision {
            allowed,
            remaining: if allowed {
                policy.limit().saturating_sub(count)
            } else {
                0
            },
            limit: policy.limit(),
            retry_after: policy.window(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use sheetwise_core::{ClientKey, Endpoint};

    async fn get_test_store() -> Option<RedisCounterStore> {
        let config = RedisCounterConfig {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
                connect_timeout: Duration::from_secs(1),
            },
            key_prefix: format!("test_ratelimit_{}", Utc::now().timestamp_millis()),
            record_ttl: Duration::from_secs(30),
        };

        RedisCounterStore::new(config).await.ok()
    }

    fn key(ip: &str) -> RateKey {
        RateKey::new(ClientKey::new(ip), Endpoint::SentimentAnalysis)
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            redis_key("ratelimit", &key("1.2.3.4")),
            "ratelimit:sentiment-analysis:1.2.3.4"
        );
    }

    #[test]
    fn test_parse_record() {
        let fields = HashMap::from([
            ("count".to_string(), "3".to_string()),
            ("window_start_ms".to_string(), "1700000000000".to_string()),
        ]);

        let record = parse_record(&key("1.2.3.4"), &fields).unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(record.window_start.timestamp_millis(), 1_700_000_000_000);

        let broken = HashMap::from([("count".to_string(), "three".to_string())]);
        assert!(parse_record(&key("1.2.3.4"), &broken).is_none());
    }

    #[test]
    fn test_hash_instant_matches_stored_precision() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let stored = hash_instant(at);

        assert_eq!(stored.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(
            Utc.timestamp_millis_opt(stored.timestamp_millis()).unwrap(),
            stored
        );
    }

    #[tokio::test]
    async fn test_redis_create_update_get() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };
        let now = Utc::now();

        assert!(store.get(&key("1.2.3.4")).await.unwrap().is_none());
        assert!(matches!(
            store.update(&key("1.2.3.4"), 2, now).await,
            Err(StoreError::NotFound)
        ));

        store.create(&key("1.2.3.4"), 1, now).await.unwrap();
        assert!(matches!(
            store.create(&key("1.2.3.4"), 1, now).await,
            Err(StoreError::Conflict)
        ));

        let written = store.update(&key("1.2.3.4"), 5, now).await.unwrap();
        let record = store.get(&key("1.2.3.4")).await.unwrap().unwrap();
        assert_eq!(record.count, 5);
        assert_eq!(record, written);
    }

    #[tokio::test]
    async fn test_redis_window_script() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };
        let policy = WindowPolicy::new(2, Duration::from_secs(60)).unwrap();
        let t0 = Utc::now();
        let k = key("5.6.7.8");

        let first = store.apply_window(&k, &policy, t0).await.unwrap();
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = store.apply_window(&k, &policy, t0).await.unwrap();
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = store.apply_window(&k, &policy, t0).await.unwrap();
        assert!(!third.allowed);
        assert_eq!(store.get(&k).await.unwrap().unwrap().count, 2);

        let reset = store
            .apply_window(&k, &policy, t0 + TimeDelta::seconds(61))
            .await
            .unwrap();
        assert!(reset.allowed);
        assert_eq!(reset.remaining, 1);
    }
}
