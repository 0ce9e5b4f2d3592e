use actix_web::{web, HttpRequest, HttpResponse};

use crate::metrics::metrics_output;
use crate::security::constant_time_eq;
use crate::state::AppState;

/// GET / - Gateway info
pub async fn info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "BitsInBinary API Gateway is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": true,
        "endpoints": {
            "auth": "/api/auth",
            "newsletter": "/api/newsletter",
            "stats": "/api/stats",
        },
        "services": {
            "newsletter": state.config.newsletter_service_url,
        },
    }))
}

/// GET /health - Health check endpoint
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let mut response = serde_json::json!({
        "status": "ok",
        "service": "bib-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "database": "ok",
    });

    if let Err(e) = state.db.ping() {
        tracing::warn!(error = %e, "health check: database unreachable");
        response["status"] = serde_json::json!("degraded");
        response["database"] = serde_json::json!("unreachable");
        return HttpResponse::ServiceUnavailable().json(response);
    }

    HttpResponse::Ok().json(response)
}

/// GET /metrics - Prometheus metrics endpoint (optionally auth-gated)
pub async fn metrics(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    // Check bearer token if METRICS_TOKEN is configured
    if let Some(ref expected_token) = state.config.metrics_token {
        let authorized = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| constant_time_eq(token.as_bytes(), expected_token.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "success": false,
                "message": "Valid Bearer token required for /metrics"
            }));
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics_output())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(info))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}
