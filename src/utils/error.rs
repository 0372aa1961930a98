//! Error types and handling
//!
//! All errors are converted to the `{ success: false, error, message }` JSON
//! shape the frontend displays verbatim.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - authentication required (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden - not on the allow-list or insufficient access level (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict - resource already exists (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity - validation failed (422)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Too many requests in the current window (429)
    #[error("Too many requests, retry in {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    /// Plan quota exhausted; the client redirects to pricing (403)
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// LLM provider failure (502)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Always false; mirrors the success envelope
    pub success: bool,
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Set when the caller must upgrade their plan
    #[serde(rename = "requiresSubscription", skip_serializing_if = "Option::is_none")]
    pub requires_subscription: Option<bool>,
    /// Seconds until the rate-limit window resets
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            requires_subscription: None,
            retry_after: None,
        }
    }

    pub fn requiring_subscription(mut self) -> Self {
        self.requires_subscription = Some(true);
        self
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, should_log) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", false),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", false),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", false),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", false),
            AppError::ValidationError(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", false)
            }
            AppError::TooManyRequests { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", false)
            }
            AppError::QuotaExceeded(_) => (StatusCode::FORBIDDEN, "quota_exceeded", false),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error", true),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", true),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", true),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", true),
        };

        if should_log {
            error!(error = %self, error_type = error_type, "Request error");
        }

        let mut body = ErrorResponse::new(error_type, self.to_string());
        match &self {
            AppError::QuotaExceeded(_) => body = body.requiring_subscription(),
            AppError::TooManyRequests { retry_after_secs } => {
                body = body.with_retry_after(*retry_after_secs)
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::TooManyRequests { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Repository errors are wrapped in anyhow context; keep unique violations visible
        if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
            if is_unique_violation(sqlx_err) {
                return AppError::Conflict("Resource already exists".to_string());
            }
        }
        AppError::Internal(err.to_string())
    }
}

/// Whether a database error is a unique constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return AppError::Conflict("Resource already exists".to_string());
        }
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Provider("Upstream request timed out".to_string())
        } else if err.is_connect() {
            AppError::Provider("Failed to connect to upstream service".to_string())
        } else {
            AppError::Provider(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("Failed to create token: {}", err))
    }
}

impl From<crate::services::GenerationError> for AppError {
    fn from(err: crate::services::GenerationError) -> Self {
        use crate::services::GenerationError;

        match err {
            GenerationError::Denied => AppError::Forbidden(err.to_string()),
            GenerationError::Throttled { retry_after_secs } => {
                AppError::TooManyRequests { retry_after_secs }
            }
            GenerationError::QuotaExceeded => AppError::QuotaExceeded(err.to_string()),
            GenerationError::KidProfileNotFound => AppError::NotFound(err.to_string()),
            GenerationError::Provider(e) => AppError::Provider(e.to_string()),
            GenerationError::Internal(e) => AppError::from(e),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
