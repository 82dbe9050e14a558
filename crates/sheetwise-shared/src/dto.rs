//! Data Transfer Objects - request/response types for the tool API.

use serde::{Deserialize, Serialize};

/// Body accepted by every AI-backed tool endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Missing input is reported by validation, not by the JSON extractor.
    #[serde(default)]
    pub input: String,
    /// Tool specific knobs (target format, SQL dialect, ...), passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

/// Successful tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub endpoint: String,
    pub output: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub counter_store: String,
}
