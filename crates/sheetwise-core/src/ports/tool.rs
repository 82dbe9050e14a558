//! Tool provider port - the AI gateway or conversion service behind a gated endpoint.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::Endpoint;

/// A validated request forwarded to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub endpoint: Endpoint,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

/// Provider trait - abstraction over the outbound AI / conversion call.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<String, ProviderError>;
}

/// Provider errors. Kept apart from the gate's own rate limiting.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Upstream provider is rate limited")]
    RateLimited,

    #[error("Upstream provider requires payment")]
    PaymentRequired,

    #[error("Upstream provider failed: {0}")]
    Upstream(String),

    #[error("Tool provider is not configured")]
    NotConfigured,
}
