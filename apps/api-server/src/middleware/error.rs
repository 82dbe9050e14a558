//! Error handling - maps handler failures to the tool API's JSON error body.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sheetwise_shared::ErrorResponse;

use sheetwise_core::DomainError;
use sheetwise_core::ports::ProviderError;

/// Application-level error type.
///
/// Upstream 429/402 are reported with their own bodies so callers can tell
/// them apart from the quota gate's 429.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream provider is rate limited")]
    UpstreamRateLimited,

    #[error("Upstream provider requires payment")]
    UpstreamPaymentRequired,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamPaymentRequired => StatusCode::PAYMENT_REQUIRED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::BadRequest(detail) => ErrorResponse::new(detail.clone()),
            AppError::UpstreamRateLimited => ErrorResponse::upstream_busy(),
            AppError::UpstreamPaymentRequired => ErrorResponse::upstream_payment_required(),
            AppError::Internal(detail) => {
                // Log internal errors, never return them
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited => AppError::UpstreamRateLimited,
            ProviderError::PaymentRequired => AppError::UpstreamPaymentRequired,
            ProviderError::Upstream(msg) => AppError::Internal(format!("tool provider: {}", msg)),
            ProviderError::NotConfigured => {
                AppError::Internal("tool provider is not configured".to_string())
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.error_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_rt::test]
    async fn test_validation_message_is_returned() {
        let err: AppError = DomainError::Validation("Input is required.".to_string()).into();
        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "Input is required." }));
    }

    #[actix_rt::test]
    async fn test_upstream_errors_stay_distinct() {
        let (status, body) = body_of(ProviderError::RateLimited.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.get("retryAfter").is_none());

        let (status, _) = body_of(ProviderError::PaymentRequired.into()).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

        let (status, body) = body_of(ProviderError::Upstream("HTTP 503".to_string()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
    }
}
