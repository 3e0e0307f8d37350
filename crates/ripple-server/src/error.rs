//! API error types
//!
//! Maps the platform error taxonomy onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ripple_core::error::RippleError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ripple(#[from] RippleError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ripple(err) => match err {
                RippleError::Unauthenticated => StatusCode::UNAUTHORIZED,
                RippleError::Forbidden { .. }
                | RippleError::CrossTenant
                | RippleError::TenantSuspended => StatusCode::FORBIDDEN,
                RippleError::NotFound { .. } => StatusCode::NOT_FOUND,
                RippleError::Conflict { .. } => StatusCode::CONFLICT,
                RippleError::Gone { .. } => StatusCode::GONE,
                RippleError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                RippleError::Database(_) | RippleError::Crypto(_) | RippleError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Ripple(err) => match err {
                RippleError::Unauthenticated => "UNAUTHENTICATED",
                RippleError::Forbidden { .. } => "FORBIDDEN",
                RippleError::CrossTenant => "CROSS_TENANT",
                RippleError::TenantSuspended => "TENANT_SUSPENDED",
                RippleError::NotFound { .. } => "NOT_FOUND",
                RippleError::Conflict { .. } => "CONFLICT",
                RippleError::Gone { .. } => "GONE",
                RippleError::Validation { .. } => "VALIDATION_ERROR",
                RippleError::Database(_) | RippleError::Crypto(_) | RippleError::Internal(_) => {
                    "INTERNAL_ERROR"
                }
            },
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, Self::Ripple(err) if err.is_internal())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_internal() {
            tracing::error!(error = %self, status = %status, "internal error");
            "internal error".to_string()
        } else {
            tracing::warn!(
                error_code = self.code(),
                error_message = %self,
                status = %status,
                "API error"
            );
            self.to_string()
        };

        let body = ErrorResponse {
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
