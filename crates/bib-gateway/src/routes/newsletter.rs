use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::GatewayError;
use crate::proxy::forward;
use crate::state::AppState;

/// ANY /api/newsletter/* - relay to the newsletter service
pub async fn relay(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    forward(
        &state.http_client,
        &state.config.newsletter_service_url,
        &req,
        body,
    )
    .await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/newsletter").default_service(web::to(relay)));
}
