//! Rate limiting port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ClientKey, Decision, Endpoint, WindowPolicy};

use super::StoreError;

/// Rate limiter trait - the single decision API used by every gated endpoint.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check whether a request is allowed and update the counter.
    ///
    /// A denial is a normal [`Decision`], not an error.
    async fn allow(
        &self,
        client: &ClientKey,
        endpoint: Endpoint,
        now: DateTime<Utc>,
    ) -> Result<Decision, RateLimitError>;

    fn policy(&self) -> &WindowPolicy;
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for RateLimitError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => RateLimitError::StoreUnavailable(msg),
            other => RateLimitError::StoreUnavailable(other.to_string()),
        }
    }
}
