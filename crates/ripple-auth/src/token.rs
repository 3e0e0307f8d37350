//! Opaque token generation and hashing, plus signed development session
//! cookies.
//!
//! Invite, magic link and session tokens are 32 random bytes encoded
//! base64url. Only their SHA-256 hash is ever persisted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ripple_core::models::identity::Identity;
use ripple_core::models::role::Role;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AuthError;

/// Generate a cryptographically random opaque token
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw token, hex-encoded. This is the only form in
/// which tokens are stored.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Claims carried by a development session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevSessionClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub tenant_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl DevSessionClaims {
    pub fn into_identity(self) -> Result<Identity, AuthError> {
        let parse = |field: &str, raw: &str| {
            Uuid::parse_str(raw)
                .map_err(|e| AuthError::TokenInvalid(format!("bad {field} in dev session: {e}")))
        };
        Ok(Identity {
            user_id: parse("sub", &self.sub)?,
            email: self.email,
            role: self.role,
            tenant_id: parse("tenant_id", &self.tenant_id)?,
            team_id: self
                .team_id
                .as_deref()
                .map(|raw| parse("team_id", raw))
                .transpose()?,
        })
    }
}

/// Sign a development session cookie for `identity` (HS256).
pub fn issue_dev_session(
    identity: &Identity,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Crypto("dev session secret is empty".into()));
    }
    let now = Utc::now().timestamp();
    let claims = DevSessionClaims {
        sub: identity.user_id.to_string(),
        email: identity.email.clone(),
        tenant_id: identity.tenant_id.to_string(),
        role: identity.role,
        team_id: identity.team_id.map(|t| t.to_string()),
        iat: now,
        exp: now + ttl.num_seconds(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Crypto(format!("dev session encode: {e}")))
}

/// Verify a development session cookie's signature and `exp`.
pub fn decode_dev_session(token: &str, secret: &str) -> Result<DevSessionClaims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::TokenInvalid("dev session secret is empty".into()));
    }
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["sub", "exp"]);

    jsonwebtoken::decode::<DevSessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    })
}
