//! HTTP pass-through to the AI / conversion gateway.
//!
//! Prompt construction lives behind the gateway. This adapter posts the
//! validated invocation as JSON and maps the gateway's status codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use sheetwise_core::ports::{ProviderError, ToolInvocation, ToolProvider};

/// Tool provider configuration.
#[derive(Debug, Clone)]
pub struct ToolProviderConfig {
    /// Gateway URL; `None` leaves the tools unconfigured.
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ToolProviderConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("TOOL_PROVIDER_URL").ok(),
            api_key: std::env::var("TOOL_PROVIDER_API_KEY").ok(),
            timeout: Duration::from_secs(
                std::env::var("TOOL_PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    output: String,
}

/// Provider that forwards invocations to an HTTP gateway.
pub struct HttpToolProvider {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpToolProvider {
    pub fn new(
        url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Upstream(e.to_string()))?;

        Ok(Self {
            url,
            api_key,
            client,
        })
    }
}

/// Map a gateway status to the provider error it represents.
pub(crate) fn status_error(status: StatusCode) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => ProviderError::PaymentRequired,
        other => ProviderError::Upstream(format!("gateway answered {}", other)),
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<String, ProviderError> {
        let endpoint = invocation.endpoint;
        let mut request = self.client.post(&self.url).json(&invocation);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%endpoint, %status, "Tool gateway returned an error");
            return Err(status_error(status));
        }

        let reply: GatewayReply = response
            .json()
            .await
            .map_err(|e| ProviderError::Upstream(format!("invalid gateway reply: {}", e)))?;

        Ok(reply.output)
    }
}

/// Provider used when no gateway URL is configured.
pub struct UnconfiguredToolProvider;

#[async_trait]
impl ToolProvider for UnconfiguredToolProvider {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<String, ProviderError> {
        tracing::warn!(endpoint = %invocation.endpoint, "TOOL_PROVIDER_URL not set");
        Err(ProviderError::NotConfigured)
    }
}
