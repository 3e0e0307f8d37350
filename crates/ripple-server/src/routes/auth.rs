//! Magic link endpoints
//!
//! - `POST /api/auth/magic-link` - request a link; always 202 for a known tenant
//! - `POST /api/auth/magic-link/verify` - consume a link, sign in when possible
//! - `POST /api/auth/logout` - end every session of the caller

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ripple_auth::magic_link::MagicLinkRequest;
use ripple_core::models::magic_link::MagicLinkIntent;
use ripple_core::models::user::UserProfile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Authenticated, clear_session_cookie, session_cookie};
use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/magic-link", post(request_magic_link))
        .route("/auth/magic-link/verify", post(verify_magic_link))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Serialize)]
pub struct MagicLinkAccepted {
    pub expires_at: DateTime<Utc>,
}

async fn request_magic_link(
    State(state): State<AppState>,
    Json(request): Json<MagicLinkRequest>,
) -> Result<(StatusCode, Json<MagicLinkAccepted>)> {
    // Delivery outcome stays server-side; the answer is the same for
    // known and unknown addresses.
    let dispatch = state.services().magic_links.send(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MagicLinkAccepted {
            expires_at: dispatch.expires_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub email: String,
    pub tenant_id: Uuid,
    pub intent: MagicLinkIntent,
    pub redirect_to: Option<String>,
    pub user: Option<UserProfile>,
    pub signed_in: bool,
}

async fn verify_magic_link(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<impl IntoResponse> {
    let services = state.services();
    let verified = services
        .magic_links
        .verify(&request.token, &request.email)
        .await?;

    let cookie = verified
        .session_token
        .as_deref()
        .map(|token| session_cookie(&services.config, token));
    let body = VerifyResponse {
        email: verified.email,
        tenant_id: verified.tenant_id,
        intent: verified.intent,
        redirect_to: verified.redirect_to,
        user: verified.user,
        signed_in: cookie.is_some(),
    };

    Ok(match cookie {
        Some(cookie) => (AppendHeaders([(SET_COOKIE, cookie)]), Json(body)).into_response(),
        None => Json(body).into_response(),
    })
}

async fn logout(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<impl IntoResponse> {
    state
        .services()
        .credentials
        .sessions()
        .end_all_sessions(identity.tenant_id, identity.user_id)
        .await?;
    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
    ))
}
