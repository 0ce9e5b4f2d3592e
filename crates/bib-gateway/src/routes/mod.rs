pub mod auth;
pub mod health;
pub mod newsletter;
pub mod stats;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::GatewayError;

/// JSON request body limit.
pub const JSON_LIMIT: usize = 10 * 1024 * 1024;

/// JSON extractor settings shared by every handler: 10 MB limit, and a malformed
/// body answers with the gateway's own error shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            tracing::debug!(error = %err, "rejected request body");
            GatewayError::BadRequest("Invalid request body".to_string()).into()
        })
}

/// Mount every route group.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure)
        .configure(auth::configure)
        .configure(stats::configure)
        .configure(newsletter::configure);
}

/// Fallback for anything no route claimed.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, GatewayError> {
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string());
    Err(GatewayError::RouteNotFound(target))
}
