//! Invite endpoints
//!
//! - `POST /api/invites` - issue an invite (tenant admin)
//! - `GET /api/invites/{token}` - validity report, never an error
//! - `POST /api/invites/{token}/accept` - accept once and sign in

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ripple_auth::invite::{AcceptInvite, CreateInviteInput, InviteValidation};
use ripple_core::models::invite::{InviteState, InviteToken};
use ripple_core::models::role::Role;
use ripple_core::models::tenant::TenantStatus;
use ripple_core::repository::Pagination;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{Authenticated, ClientInfo, session_cookie};
use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invites", post(create_invite).get(list_invites))
        .route("/invites/{token}", get(validate_invite))
        .route("/invites/{token}/accept", post(accept_invite))
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub invite_url: String,
    pub email_sent: bool,
}

async fn create_invite(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Json(input): Json<CreateInviteInput>,
) -> Result<(StatusCode, Json<InviteResponse>)> {
    let issued = state.services().invites.create(&identity, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            id: issued.invite.id,
            email: issued.invite.email,
            role: issued.invite.role,
            tenant_id: issued.invite.tenant_id,
            expires_at: issued.invite.expires_at,
            invite_url: issued.accept_url,
            email_sent: issued.delivered,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListInvitesQuery {
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// An issued invite as seen by the admin who manages it. The token hash
/// stays server-side.
#[derive(Debug, Serialize)]
pub struct InviteSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub inviter_id: Uuid,
    pub team_id: Option<Uuid>,
    pub state: InviteState,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InviteSummary {
    fn from_invite(invite: InviteToken, now: DateTime<Utc>) -> Self {
        Self {
            state: invite.state_at(now, TenantStatus::Active),
            id: invite.id,
            email: invite.email,
            role: invite.role,
            inviter_id: invite.inviter_id,
            team_id: invite.team_id,
            expires_at: invite.expires_at,
            used_at: invite.used_at,
            created_at: invite.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InviteListResponse {
    pub items: Vec<InviteSummary>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

const MAX_PAGE_SIZE: u64 = 100;

async fn list_invites(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Query(query): Query<ListInvitesQuery>,
) -> Result<Json<InviteListResponse>> {
    let defaults = Pagination::default();
    let pagination = Pagination {
        offset: query.offset.unwrap_or(defaults.offset),
        limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
    };
    let page = state.services().invites.list(&identity, pagination).await?;
    let now = Utc::now();
    Ok(Json(InviteListResponse {
        items: page
            .items
            .into_iter()
            .map(|invite| InviteSummary::from_invite(invite, now))
            .collect(),
        total: page.total,
        offset: page.offset,
        limit: page.limit,
    }))
}

async fn validate_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<InviteValidation> {
    Json(state.services().invites.validate(&token).await)
}

async fn accept_invite(
    State(state): State<AppState>,
    client: ClientInfo,
    Path(token): Path<String>,
    Json(accept): Json<AcceptInvite>,
) -> Result<impl IntoResponse> {
    let services = state.services();
    let user = services.invites.consume(&token, accept).await?;
    let session = services
        .credentials
        .sessions()
        .establish_session(&user, client.ip_address, client.user_agent)
        .await?;
    info!(user_id = %user.id, tenant_id = %user.tenant_id, "invite accepted, session started");

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&services.config, &session.token))]),
        Json(user),
    ))
}
