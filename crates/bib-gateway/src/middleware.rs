//! Session extraction and the session cookie.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::config::GatewayConfig;
use crate::db::User;
use crate::error::GatewayError;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";
/// Cookie value written on logout; treated as "no session".
pub const LOGGED_OUT_SENTINEL: &str = "none";
const LOGOUT_COOKIE_SECS: i64 = 10;

/// Pull the raw session token from a request.
///
/// `Authorization: Bearer <token>` wins over the `token` cookie.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    req.cookie(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty() && v != LOGGED_OUT_SENTINEL)
}

/// The account behind a valid session token. Use as a handler argument to
/// require authentication; rejection is always 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = GatewayError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, GatewayError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| GatewayError::Internal("application state missing".to_string()))?;

    let token = extract_token(req).ok_or(GatewayError::Unauthorized)?;

    let claims = state.tokens.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        GatewayError::Unauthorized
    })?;

    match state.db.find_user_by_id(&claims.id) {
        Ok(Some(user)) => Ok(AuthenticatedUser(user)),
        Ok(None) => Err(GatewayError::Unauthorized),
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            Err(GatewayError::Unauthorized)
        }
    }
}

/// `token=<jwt>`: HttpOnly, SameSite=Strict, Secure in production.
pub fn session_cookie(token: &str, config: &GatewayConfig) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Strict)
        .max_age(Duration::days(config.cookie_expire_days))
        .finish()
}

/// Overwrites the session cookie with the logout sentinel for ten seconds.
pub fn logout_cookie() -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, LOGGED_OUT_SENTINEL)
        .path("/")
        .http_only(true)
        .max_age(Duration::seconds(LOGOUT_COOKIE_SECS))
        .finish()
}
