//! Quota gate middleware.
//!
//! Wraps one AI-backed resource. Resolves the client key, asks the shared
//! rate limiter, and either answers 429 or forwards to the handler with the
//! remaining quota attached to the response.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{
        Method,
        header::{HeaderMap, HeaderName, HeaderValue},
    },
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;

use sheetwise_core::ports::{RateLimitError, RateLimiter};
use sheetwise_core::{ClientKey, Decision, Endpoint};
use sheetwise_shared::ErrorResponse;

/// Header carrying the quota left in the current window.
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// What the gate does when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Answer 500 without calling the handler.
    #[default]
    FailClosed,
    /// Call the handler without a quota header.
    FailOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatePolicy {
    pub on_store_error: FailurePolicy,
}

/// Resolve the client key from `X-Forwarded-For`, then `X-Real-IP`.
pub fn client_key(headers: &HeaderMap) -> ClientKey {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    ClientKey::from_forwarded(header("x-forwarded-for"), header("x-real-ip"))
}

/// Quota outcome stored in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct Quota {
    pub client: ClientKey,
    pub endpoint: Endpoint,
    pub decision: Decision,
}

impl actix_web::FromRequest for Quota {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut Payload) -> Self::Future {
        let quota = req.extensions().get::<Quota>().cloned();
        ready(quota.ok_or_else(|| {
            actix_web::error::ErrorInternalServerError("route is not behind the quota gate")
        }))
    }
}

/// Quota gate factory. One instance per protected endpoint.
pub struct RateLimitGate {
    limiter: Arc<dyn RateLimiter>,
    endpoint: Endpoint,
    policy: GatePolicy,
}

impl RateLimitGate {
    pub fn new(limiter: Arc<dyn RateLimiter>, endpoint: Endpoint, policy: GatePolicy) -> Self {
        Self {
            limiter,
            endpoint,
            policy,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitGateService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            endpoint: self.endpoint,
            policy: self.policy,
        }))
    }
}

pub struct RateLimitGateService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    endpoint: Endpoint,
    policy: GatePolicy,
}

/// Run the check on its own task so the counter write finishes even if the
/// client disconnects mid-request.
async fn check(
    limiter: Arc<dyn RateLimiter>,
    client: ClientKey,
    endpoint: Endpoint,
    now: DateTime<Utc>,
) -> Result<Decision, RateLimitError> {
    actix_web::rt::spawn(async move { limiter.allow(&client, endpoint, now).await })
        .await
        .map_err(|e| RateLimitError::StoreUnavailable(format!("limiter task failed: {}", e)))?
}

impl<S, B> Service<ServiceRequest> for RateLimitGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();
        let endpoint = self.endpoint;
        let policy = self.policy;

        Box::pin(async move {
            // CORS preflight never counts against the quota.
            if *req.method() == Method::OPTIONS {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let client = client_key(req.headers());
            let now = Utc::now();

            match check(limiter, client.clone(), endpoint, now).await {
                Ok(decision) if !decision.allowed => {
                    tracing::warn!(
                        client_key = %client,
                        %endpoint,
                        limit = decision.limit,
                        "Rate limit exceeded"
                    );

                    let retry_after = decision.retry_after.as_secs();
                    let response = HttpResponse::TooManyRequests()
                        .insert_header((REMAINING_HEADER, "0"))
                        .insert_header(("Retry-After", retry_after.to_string()))
                        .json(ErrorResponse::rate_limited(decision.limit, retry_after));

                    Ok(req.into_response(response).map_into_right_body())
                }
                Ok(decision) => {
                    tracing::debug!(
                        client_key = %client,
                        %endpoint,
                        remaining = decision.remaining,
                        "Request admitted"
                    );

                    req.extensions_mut().insert(Quota {
                        client,
                        endpoint,
                        decision,
                    });

                    let mut res = service.call(req).await?;
                    if res.status().is_success() {
                        res.headers_mut().insert(
                            HeaderName::from_static("x-ratelimit-remaining"),
                            HeaderValue::from(decision.remaining),
                        );
                    }
                    Ok(res.map_into_left_body())
                }
                Err(e) => {
                    tracing::error!(
                        client_key = %client,
                        %endpoint,
                        at = %now.to_rfc3339(),
                        error = %e,
                        policy = ?policy.on_store_error,
                        "Rate limiter unavailable"
                    );

                    match policy.on_store_error {
                        FailurePolicy::FailOpen => {
                            let res = service.call(req).await?;
                            Ok(res.map_into_left_body())
                        }
                        FailurePolicy::FailClosed => {
                            let response = HttpResponse::InternalServerError()
                                .json(ErrorResponse::internal_error());
                            Ok(req.into_response(response).map_into_right_body())
                        }
                    }
                }
            }
        })
    }
}
