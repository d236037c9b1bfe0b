//! Error handling for the BookStore HTTP layer

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

static EXPOSE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(false);

/// Controls whether 500 responses carry the underlying error message.
/// Off unless bootstrap enables it for local development.
pub fn expose_internal_details(enabled: bool) {
    EXPOSE_INTERNAL_DETAILS.store(enabled, Ordering::Relaxed);
}

/// Standard error response format for HTTP errors that carry a body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub details: Vec<serde_json::Value>,
    pub message: String,
    pub code: String,
    pub trace_id: String,
    pub timestamp: String,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String, code: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String, code: String },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: "unauthorized".to_string(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            code: "forbidden".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<(String, serde_json::Value)> = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let field = field.to_string();
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                details.push((
                    field.clone(),
                    json!({
                        "field": field,
                        "error": error.code.to_string(),
                        "message": message,
                    }),
                ));
            }
        }
        details.sort_by(|a, b| a.0.cmp(&b.0));

        AppError::validation(
            details.into_iter().map(|(_, detail)| detail).collect(),
            "One or more fields failed validation",
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_id = Uuid::new_v4();

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                status_code = %status.as_u16(),
                error = %self,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                status_code = %status.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        let (error_code, message, details) = match self {
            // Absence and auth failures carry no body.
            AppError::NotFound { .. } | AppError::Forbidden { .. } => {
                return status.into_response();
            }
            AppError::Unauthorized { .. } => {
                return (
                    status,
                    [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                )
                    .into_response();
            }
            AppError::Validation {
                details,
                code,
                message,
            } => (code, message, details),
            AppError::BadRequest { message, code } => (code, message, Vec::new()),
            AppError::RateLimited { retry_after_secs } => {
                let body = error_body(
                    "rate_limited".to_string(),
                    format!("Too many requests, retry after {} seconds", retry_after_secs),
                    Vec::new(),
                    error_id,
                );
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                return response;
            }
            AppError::Internal(e) => {
                let message = if EXPOSE_INTERNAL_DETAILS.load(Ordering::Relaxed) {
                    format!("{:#}", e)
                } else {
                    "An internal server error occurred".to_string()
                };
                ("internal_error".to_string(), message, Vec::new())
            }
        };

        (status, Json(error_body(error_code, message, details, error_id))).into_response()
    }
}

fn error_body(
    code: String,
    message: String,
    details: Vec<serde_json::Value>,
    error_id: Uuid,
) -> serde_json::Value {
    let body = ErrorBody {
        details,
        message,
        code,
        trace_id: error_id.to_string(),
        timestamp: OffsetDateTime::now_utc().to_string(),
    };
    json!({ "error": body })
}
