//! Booking service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages for 5xx responses are generic; the underlying detail is logged
//! server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication failures raised by the identity context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization` header on the request.
    #[error("No authorization header")]
    MissingHeader,

    /// Header present but carries no bearer token.
    #[error("Malformed authorization header")]
    MalformedHeader,

    /// Signature or claims failed verification.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// No signing secret configured on this instance.
    #[error("Token signing secret is not configured")]
    SecretNotConfigured,
}

/// Booking service error type.
///
/// Maps to HTTP status codes:
/// - Validation, NotFound, Auth(missing/malformed header): 400 Bad Request
/// - Auth(invalid token): 401 Unauthorized
/// - Auth(secret unconfigured), Capacity, Upstream, Persistence, Internal: 500
#[derive(Debug, Error)]
pub enum BkError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient capacity: {0}")]
    Capacity(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error")]
    Internal,
}

impl BkError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            BkError::Auth(AuthError::MissingHeader | AuthError::MalformedHeader)
            | BkError::Validation(_)
            | BkError::NotFound(_) => 400,
            BkError::Auth(AuthError::InvalidToken(_)) => 401,
            BkError::Auth(AuthError::SecretNotConfigured)
            | BkError::Capacity(_)
            | BkError::Upstream(_)
            | BkError::Persistence(_)
            | BkError::Internal => 500,
        }
    }

    /// Bounded label used for operation metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            BkError::Auth(_) => "auth",
            BkError::Validation(_) => "validation",
            BkError::NotFound(_) => "not_found",
            BkError::Capacity(_) => "capacity",
            BkError::Upstream(_) => "upstream",
            BkError::Persistence(_) => "persistence",
            BkError::Internal => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BkError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            BkError::Auth(AuthError::MissingHeader) => (
                StatusCode::BAD_REQUEST,
                "MISSING_AUTHORIZATION",
                "No authorization header".to_string(),
            ),
            BkError::Auth(AuthError::MalformedHeader) => (
                StatusCode::BAD_REQUEST,
                "MALFORMED_AUTHORIZATION",
                "Authorization header must carry a bearer token".to_string(),
            ),
            BkError::Auth(AuthError::InvalidToken(reason)) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            BkError::Auth(AuthError::SecretNotConfigured) => {
                tracing::error!(target: "bk.auth", "Token signing secret is not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_NOT_CONFIGURED",
                    "An internal error occurred".to_string(),
                )
            }
            BkError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", reason.clone())
            }
            BkError::NotFound(resource) => {
                (StatusCode::BAD_REQUEST, "NOT_FOUND", resource.clone())
            }
            BkError::Capacity(reason) => {
                tracing::warn!(target: "bk.capacity", reason = %reason, "Capacity unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "NO_CAPACITY",
                    "No free spaces available at this location".to_string(),
                )
            }
            BkError::Upstream(err) => {
                tracing::error!(target: "bk.upstream", error = %err, "Upstream call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_ERROR",
                    "A dependent service is unavailable".to_string(),
                )
            }
            BkError::Persistence(err) => {
                tracing::error!(target: "bk.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            BkError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"bookings\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to BkError
impl From<sqlx::Error> for BkError {
    fn from(err: sqlx::Error) -> Self {
        BkError::Persistence(err.to_string())
    }
}
