use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::db::{NewUser, User};
use crate::error::GatewayError;
use crate::metrics::AUTH_EVENTS;
use crate::middleware::{logout_cookie, session_cookie, AuthenticatedUser};
use crate::oauth::{resolve_account, OAuthError};
use crate::password::{hash_password, verify_password};
use crate::state::AppState;
use crate::validation::{validate_login, validate_registration, validate_username};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// `email` carries either an e-mail address or a username.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckUsernameRequest {
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Issue a token for `user` and answer with it in both the body and a cookie.
fn token_response(
    state: &AppState,
    user: &User,
    status: StatusCode,
) -> Result<HttpResponse, GatewayError> {
    let token = state.tokens.issue(&user.id)?;
    Ok(HttpResponse::build(status)
        .cookie(session_cookie(&token, &state.config))
        .json(serde_json::json!({
            "success": true,
            "token": token,
            "user": user.profile(),
        })))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn sign_in_error(state: &AppState, reason: &str) -> HttpResponse {
    redirect(&format!(
        "{}/sign-in?error={}",
        state.config.frontend_url, reason
    ))
}

/// POST /api/auth/register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, GatewayError> {
    let input = validate_registration(
        body.name.as_deref(),
        body.username.as_deref(),
        body.email.as_deref(),
        body.password.as_deref(),
    )
    .map_err(|errors| GatewayError::validation("Validation failed", errors))?;

    if let Some(field) = state.db.find_conflict(&input.email, &input.username)? {
        AUTH_EVENTS.with_label_values(&["register", "conflict"]).inc();
        return Err(GatewayError::UserExists(field));
    }

    let password = input.password.clone();
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| GatewayError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| GatewayError::Internal(format!("password hashing failed: {e}")))?;

    let user = state.db.create_user(&NewUser {
        name: input.name,
        username: input.username,
        email: input.email,
        password_hash: Some(password_hash),
        ..Default::default()
    })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    AUTH_EVENTS.with_label_values(&["register", "success"]).inc();

    state.notifier.send_welcome(&user.email, &user.name);

    token_response(&state, &user, StatusCode::CREATED)
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, GatewayError> {
    let input = validate_login(body.email.as_deref(), body.password.as_deref())
        .map_err(|errors| GatewayError::validation("Validation failed", errors))?;

    let user = state.db.find_user_by_login(&input.identifier)?;

    // OAuth-only accounts have no password and fail like an unknown user
    let Some((user, hash)) = user.and_then(|u| u.password_hash.clone().map(|h| (u, h))) else {
        AUTH_EVENTS.with_label_values(&["login", "failure"]).inc();
        return Err(GatewayError::InvalidCredentials);
    };

    let password = input.password;
    let matches = web::block(move || verify_password(&password, &hash))
        .await
        .map_err(|e| GatewayError::Internal(format!("verification task failed: {e}")))?;
    if !matches {
        AUTH_EVENTS.with_label_values(&["login", "failure"]).inc();
        return Err(GatewayError::InvalidCredentials);
    }

    tracing::info!(user_id = %user.id, "user logged in");
    AUTH_EVENTS.with_label_values(&["login", "success"]).inc();
    token_response(&state, &user, StatusCode::OK)
}

/// POST /api/auth/check-username
pub async fn check_username(
    state: web::Data<AppState>,
    body: web::Json<CheckUsernameRequest>,
) -> Result<HttpResponse, GatewayError> {
    let username = validate_username(body.username.as_deref())
        .map_err(|errors| GatewayError::validation("Invalid username format", errors))?;

    let taken = state.db.username_exists(&username)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "available": !taken,
        "message": if taken { "Username is already taken" } else { "Username is available" },
    })))
}

/// GET /api/auth/google - start the Google consent flow
pub async fn google(state: web::Data<AppState>) -> HttpResponse {
    match state.google {
        Some(ref strategy) => redirect(&strategy.authorization_url()),
        None => {
            tracing::warn!("Google sign-in requested but not configured");
            sign_in_error(&state, "auth_failed")
        }
    }
}

/// GET /api/auth/google/callback
pub async fn google_callback(
    state: web::Data<AppState>,
    query: web::Query<GoogleCallbackQuery>,
) -> HttpResponse {
    let user = match complete_google_sign_in(&state, query.into_inner()).await {
        Ok(user) => user,
        Err(CallbackFailure::Auth(e)) => {
            tracing::warn!(error = %e, "Google sign-in failed");
            AUTH_EVENTS.with_label_values(&["google", "failure"]).inc();
            return sign_in_error(&state, "auth_failed");
        }
        Err(CallbackFailure::Server(e)) => {
            tracing::error!(error = %e, "Google sign-in account resolution failed");
            AUTH_EVENTS.with_label_values(&["google", "error"]).inc();
            return sign_in_error(&state, "server_error");
        }
    };

    let token = match state.tokens.issue(&user.id) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to issue token after Google sign-in");
            return sign_in_error(&state, "server_error");
        }
    };

    AUTH_EVENTS.with_label_values(&["google", "success"]).inc();
    HttpResponse::Found()
        .cookie(session_cookie(&token, &state.config))
        .insert_header((
            header::LOCATION,
            format!("{}/auth/callback?token={}", state.config.frontend_url, token),
        ))
        .finish()
}

enum CallbackFailure {
    /// Provider-side or request problem
    Auth(OAuthError),
    /// Local store problem
    Server(GatewayError),
}

async fn complete_google_sign_in(
    state: &AppState,
    query: GoogleCallbackQuery,
) -> Result<User, CallbackFailure> {
    let strategy = state.google.as_ref().ok_or_else(|| {
        CallbackFailure::Auth(OAuthError::ProviderDenied("not configured".to_string()))
    })?;

    if let Some(error) = query.error {
        return Err(CallbackFailure::Auth(OAuthError::ProviderDenied(error)));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(CallbackFailure::Auth(OAuthError::MissingCode))?;
    strategy
        .verify_state(query.state.as_deref().unwrap_or_default())
        .map_err(CallbackFailure::Auth)?;

    let access_token = strategy
        .exchange_code(&code)
        .await
        .map_err(CallbackFailure::Auth)?;
    let profile = strategy
        .fetch_profile(&access_token)
        .await
        .map_err(CallbackFailure::Auth)?;
    if profile.email.as_deref().map_or(true, |e| e.trim().is_empty()) {
        return Err(CallbackFailure::Auth(OAuthError::MissingEmail));
    }

    resolve_account(&state.db, &profile).map_err(CallbackFailure::Server)
}

/// POST /api/auth/logout
pub async fn logout(user: AuthenticatedUser) -> HttpResponse {
    tracing::debug!(user_id = %user.0.id, "user logged out");
    HttpResponse::Ok()
        .cookie(logout_cookie())
        .json(serde_json::json!({
            "success": true,
            "message": "User logged out successfully",
        }))
}

/// GET /api/auth/me
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": user.0.profile_with_created_at(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/check-username", web::post().to(check_username))
            .route("/google", web::get().to(google))
            .route("/google/callback", web::get().to(google_callback))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me)),
    );
}
