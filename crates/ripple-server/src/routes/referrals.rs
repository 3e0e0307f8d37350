//! Referral endpoints
//!
//! - `GET /r/{username}` - public referral link, always a 303
//! - `GET /api/referral-link` - the caller's link
//! - `POST /api/referrals/signup` - referred customer signup
//! - `GET /api/referrals/downline` - the caller's referral tree

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use ripple_auth::referral::{DownlineEntry, ReferralLink, ReferralSignup};
use ripple_core::models::user::UserProfile;
use serde::Serialize;

use crate::auth::{Authenticated, MaybeIdentity};
use crate::error::Result;
use crate::state::AppState;

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/r/{username}", get(visit_referral_link))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/referral-link", get(referral_link))
        .route("/referrals/signup", post(referral_signup))
        .route("/referrals/downline", get(downline))
}

async fn visit_referral_link(
    State(state): State<AppState>,
    Path(username): Path<String>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Redirect {
    let redirect = state
        .services()
        .referrals
        .visit(&username, identity.as_ref())
        .await;
    Redirect::to(redirect.url())
}

async fn referral_link(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<ReferralLink>> {
    Ok(Json(state.services().referrals.link_for(&identity).await?))
}

async fn referral_signup(
    State(state): State<AppState>,
    Json(signup): Json<ReferralSignup>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let user = state.services().referrals.complete_signup(signup).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Serialize)]
pub struct DownlineResponse {
    pub direct_referrals: usize,
    pub total: usize,
    pub entries: Vec<DownlineEntry>,
}

async fn downline(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<DownlineResponse>> {
    let referrals = &state.services().referrals;
    let direct_referrals = referrals.referrals_made(&identity).await?.len();
    let entries = referrals.downline(&identity).await?;
    Ok(Json(DownlineResponse {
        direct_referrals,
        total: entries.len(),
        entries,
    }))
}
