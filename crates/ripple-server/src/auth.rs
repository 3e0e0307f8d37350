//! Request authentication
//!
//! Extracts the request's [`Credential`] from the `Authorization: Bearer`
//! header or the session cookies and resolves it to an identity.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use axum::http::request::Parts;
use ripple_auth::identity::{DEV_SESSION_COOKIE, SESSION_COOKIE};
use ripple_auth::{AuthConfig, Credential, IdentitySource};
use ripple_core::error::RippleError;
use ripple_core::models::identity::Identity;

use crate::error::ApiError;
use crate::state::AppState;

/// Maximum token size (8KB)
const MAX_TOKEN_SIZE: usize = 8 * 1024;

/// Maximum cookie header size (16KB)
const MAX_COOKIE_SIZE: usize = 16 * 1024;

pub(crate) fn extract_credential(parts: &Parts) -> Credential {
    if let Some(token) = bearer_token(parts) {
        return Credential::SessionToken(token);
    }
    if let Some(token) = cookie_value(parts, SESSION_COOKIE) {
        return Credential::SessionToken(token);
    }
    if let Some(token) = cookie_value(parts, DEV_SESSION_COOKIE) {
        return Credential::DevSession(token);
    }
    Credential::Anonymous
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION)?;
    if header.len() > MAX_TOKEN_SIZE + 7 {
        return None;
    }
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    let header = parts.headers.get(COOKIE)?;
    if header.len() > MAX_COOKIE_SIZE {
        return None;
    }
    header
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty() && value.len() <= MAX_TOKEN_SIZE)
        .map(str::to_string)
}

/// Client address and user agent, recorded on new sessions.
pub(crate) fn client_info(parts: &Parts) -> (Option<String>, Option<String>) {
    let ip = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());
    let user_agent = parts
        .headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (ip, user_agent)
}

/// `Set-Cookie` value for a freshly issued session token.
pub(crate) fn session_cookie(config: &AuthConfig, token: &str) -> String {
    let secure = if config.app_base_url.starts_with("https://") {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        config.session_lifetime_secs
    )
}

/// Expires the session cookie in the browser.
pub(crate) fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The caller's identity, if any. Never rejects an anonymous request.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = extract_credential(parts);
        let identity = state.services().credentials.resolve(&credential).await?;
        Ok(Self(identity))
    }
}

/// An authenticated caller; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybeIdentity(identity) = MaybeIdentity::from_request_parts(parts, state).await?;
        identity
            .map(Self)
            .ok_or(ApiError::Ripple(RippleError::Unauthenticated))
    }
}

/// Request metadata recorded on sessions issued by the handler.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (ip_address, user_agent) = client_info(parts);
        Ok(Self {
            ip_address,
            user_agent,
        })
    }
}
