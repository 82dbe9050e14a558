use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClientKey, Endpoint};

/// Composite key of a rate counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateKey {
    pub client: ClientKey,
    pub endpoint: Endpoint,
}

impl RateKey {
    pub fn new(client: ClientKey, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.client)
    }
}

/// Stored counter for one `(client, endpoint)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    pub client: ClientKey,
    pub endpoint: Endpoint,
    /// Requests counted in the current window.
    pub count: u32,
    /// When the current window began.
    pub window_start: DateTime<Utc>,
}

impl RateRecord {
    pub fn new(key: &RateKey, count: u32, window_start: DateTime<Utc>) -> Self {
        Self {
            client: key.client.clone(),
            endpoint: key.endpoint,
            count,
            window_start,
        }
    }

    pub fn key(&self) -> RateKey {
        RateKey::new(self.client.clone(), self.endpoint)
    }
}
