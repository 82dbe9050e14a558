//! CORS for the browser-side tool pages.

use actix_cors::Cors;
use actix_web::HttpResponse;
use actix_web::http::header;

/// Any origin, answered with a literal `*`. Browser preflights are handled
/// here and never reach the quota gate.
pub fn policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allowed_methods(["POST", "OPTIONS"])
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(86_400)
}

/// Plain `OPTIONS` without a CORS request method: empty body.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ALLOW, "POST, OPTIONS"))
        .finish()
}
