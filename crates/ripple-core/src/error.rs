//! Error types for the Ripple platform.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RippleError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("identity does not belong to the requested tenant")]
    CrossTenant,

    #[error("tenant is suspended")]
    TenantSuspended,

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    Conflict { entity: String },

    #[error("gone: {reason}")]
    Gone { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RippleError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &str) -> Self {
        Self::Conflict {
            entity: entity.to_string(),
        }
    }

    pub fn gone(reason: impl Into<String>) -> Self {
        Self::Gone {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for failures the caller cannot act on (store, crypto, bugs).
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_)
        )
    }
}

pub type RippleResult<T> = Result<T, RippleError>;
