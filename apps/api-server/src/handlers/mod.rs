//! HTTP handlers and route configuration.

mod health;
mod tools;

use actix_web::{HttpRequest, error::JsonPayloadError, http::Method, web};
use sheetwise_core::Endpoint;

use crate::middleware::cors;
use crate::middleware::error::AppError;
use crate::middleware::rate_limit::RateLimitGate;
use crate::state::AppState;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!("Rejected tool request body: {}", err);
    AppError::BadRequest("Invalid request body.".to_string()).into()
}

/// Configure all application routes.
///
/// Every tool endpoint sits behind its own quota gate sharing one limiter.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    let mut gated = web::scope("/tools")
        .app_data(web::JsonConfig::default().error_handler(json_error));

    for endpoint in Endpoint::ALL {
        gated = gated.service(
            web::resource(format!("/{}", endpoint))
                .app_data(web::Data::new(endpoint))
                .wrap(RateLimitGate::new(
                    state.limiter.clone(),
                    endpoint,
                    state.gate,
                ))
                .route(web::post().to(tools::run_tool))
                .route(web::method(Method::OPTIONS).to(cors::preflight)),
        );
    }

    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Quota-gated tools
            .service(gated),
    );
}
