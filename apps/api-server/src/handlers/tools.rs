//! AI-backed tool handlers.

use actix_web::{HttpResponse, web};
use sheetwise_core::Endpoint;
use sheetwise_core::ports::ToolInvocation;
use sheetwise_shared::dto::{ToolRequest, ToolResponse};

use crate::middleware::error::AppResult;
use crate::middleware::rate_limit::Quota;
use crate::state::AppState;

/// Run one tool invocation.
///
/// POST /api/tools/{endpoint}
///
/// Input is validated after the gate has counted the request.
pub async fn run_tool(
    endpoint: web::Data<Endpoint>,
    state: web::Data<AppState>,
    quota: Option<Quota>,
    body: web::Json<ToolRequest>,
) -> AppResult<HttpResponse> {
    let endpoint = **endpoint;
    let ToolRequest { input, options } = body.into_inner();
    let input = endpoint.validate_input(&input)?.to_string();

    if let Some(quota) = &quota {
        tracing::debug!(
            client_key = %quota.client,
            %endpoint,
            remaining = quota.decision.remaining,
            "Invoking tool provider"
        );
    }

    let output = state
        .provider
        .invoke(ToolInvocation {
            endpoint,
            input,
            options,
        })
        .await?;

    Ok(HttpResponse::Ok().json(ToolResponse {
        endpoint: endpoint.to_string(),
        output,
    }))
}
