//! Auth-layer error types.

use ripple_core::error::RippleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("role is not eligible: {0}")]
    RoleNotEligible(String),

    #[error("tenant inactive")]
    TenantInactive,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cannot modify your own role")]
    SelfRoleChange,

    #[error("self-referral is not allowed")]
    SelfReferral,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for RippleError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::RoleNotEligible(_) | AuthError::SelfRoleChange => RippleError::Forbidden {
                reason: err.to_string(),
            },
            AuthError::TenantInactive => RippleError::TenantSuspended,
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => RippleError::Unauthenticated,
            AuthError::SelfReferral => RippleError::Validation {
                message: err.to_string(),
            },
            AuthError::Crypto(msg) => RippleError::Crypto(msg),
        }
    }
}
