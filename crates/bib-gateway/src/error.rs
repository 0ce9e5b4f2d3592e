use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

/// One failed input rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Input failed one or more field rules
    #[error("{message}")]
    Validation {
        message: &'static str,
        errors: Vec<FieldError>,
    },
    /// Malformed or incomplete request body
    #[error("{0}")]
    BadRequest(String),
    /// Registration collided on a unique field ("email" or "username")
    #[error("User already exists with this {0}")]
    UserExists(&'static str),
    /// Wrong identifier or password. Deliberately field-agnostic.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Missing, invalid or expired session credential
    #[error("Not authorized to access this route")]
    Unauthorized,
    #[error("Route {0} not found")]
    RouteNotFound(String),
    /// Downstream could not be reached at the transport level
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("token error: {0}")]
    Token(#[from] crate::token::TokenError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(message: &'static str, errors: Vec<FieldError>) -> Self {
        GatewayError::Validation { message, errors }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. }
            | GatewayError::BadRequest(_)
            | GatewayError::UserExists(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidCredentials | GatewayError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Database(_) | GatewayError::Token(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            GatewayError::Validation { message, errors } => serde_json::json!({
                "success": false,
                "message": message,
                "errors": errors,
            }),
            GatewayError::UpstreamUnavailable(msg) => {
                tracing::warn!(error = %msg, "downstream unavailable");
                serde_json::json!({
                    "success": false,
                    "message": "Service temporarily unavailable",
                    "error": msg,
                })
            }
            GatewayError::Database(_) | GatewayError::Token(_) | GatewayError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                serde_json::json!({
                    "success": false,
                    "message": "Server error",
                })
            }
            other => serde_json::json!({
                "success": false,
                "message": other.to_string(),
            }),
        };

        HttpResponse::build(status).json(body)
    }
}
