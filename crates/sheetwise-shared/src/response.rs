//! Error body returned by the tool API.

use serde::{Deserialize, Serialize};

/// JSON error body: `{"error": "...", "retryAfter": 3600}`.
///
/// `retryAfter` is only present on responses produced by the quota gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Body of a request denied by the quota gate.
    pub fn rate_limited(limit: u32, retry_after_secs: u64) -> Self {
        Self::new(format!(
            "Rate limit exceeded. You can make {} requests per hour. Please try again later.",
            limit
        ))
        .with_retry_after(retry_after_secs)
    }

    pub fn internal_error() -> Self {
        Self::new("Internal server error")
    }

    pub fn upstream_busy() -> Self {
        Self::new("The AI service is busy. Please try again shortly.")
    }

    pub fn upstream_payment_required() -> Self {
        Self::new("The AI service quota is exhausted. Please try again later.")
    }
}
