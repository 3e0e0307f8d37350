//! Permission and user administration endpoints
//!
//! - `GET /api/permissions?user_id=&team_id=` - effective permissions
//! - `PUT /api/permissions/overrides` - grant or deny one pair
//! - `DELETE /api/permissions/overrides` - remove an override
//! - `GET /api/impersonation/targets` - users an admin may view as
//! - `PUT /api/users/{user_id}/role` - change a user's role

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use ripple_auth::EffectivePermissions;
use ripple_core::error::RippleError;
use ripple_core::models::permission::{
    Action, Module, PermissionKey, PermissionOverride, SetPermissionOverride,
};
use ripple_core::models::role::Role;
use ripple_core::models::user::UserProfile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/permissions", get(effective_permissions))
        .route(
            "/permissions/overrides",
            put(set_override).delete(clear_override),
        )
        .route("/impersonation/targets", get(impersonation_targets))
        .route("/users/{user_id}/role", put(change_role))
}

// =============================================================================
// Permissions
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    #[serde(flatten)]
    pub effective: EffectivePermissions,
    /// `module:action` strings the user can exercise.
    pub allowed: BTreeSet<String>,
}

async fn effective_permissions(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Query(query): Query<PermissionQuery>,
) -> Result<Json<PermissionsResponse>> {
    let (Some(user_id), Some(team_id)) = (query.user_id, query.team_id) else {
        return Err(ApiError::bad_request("user_id and team_id are required"));
    };

    if user_id != identity.user_id {
        // Only admins may inspect someone else's permissions.
        if !identity.role.is_administrative() {
            return Err(RippleError::forbidden("cannot view another user's permissions").into());
        }
        state
            .services()
            .access
            .require(
                Some(&identity),
                identity.tenant_id,
                Some((Module::UserManagement, Action::View)),
            )
            .await?;
    }

    let effective = state
        .permissions()
        .evaluate(identity.tenant_id, user_id, Some(team_id))
        .await?;
    let allowed = effective.allowed().iter().map(PermissionKey::to_string).collect();
    Ok(Json(PermissionsResponse { effective, allowed }))
}

async fn set_override(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Json(input): Json<SetPermissionOverride>,
) -> Result<Json<PermissionOverride>> {
    Ok(Json(state.permissions().set_override(&identity, input).await?))
}

#[derive(Debug, Deserialize)]
pub struct ClearOverrideRequest {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub team_id: Option<Uuid>,
    /// `module:action`
    pub permission: String,
}

async fn clear_override(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Json(request): Json<ClearOverrideRequest>,
) -> Result<StatusCode> {
    let key = PermissionKey::parse(&request.permission).ok_or_else(|| {
        ApiError::bad_request(format!("unknown permission: {}", request.permission))
    })?;
    state
        .permissions()
        .clear_override(
            &identity,
            request.tenant_id,
            request.user_id,
            request.team_id,
            key,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<Uuid>,
}

async fn impersonation_targets(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Vec<UserProfile>>> {
    let tenant_id = query.tenant_id.unwrap_or(identity.tenant_id);
    let users = state
        .services()
        .access
        .list_impersonation_targets(&identity, tenant_id)
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
    /// Defaults to the caller's tenant.
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

async fn change_role(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<Json<UserProfile>> {
    let tenant_id = request.tenant_id.unwrap_or(identity.tenant_id);
    let user = state
        .services()
        .access
        .change_role(&identity, tenant_id, user_id, request.role)
        .await?;
    Ok(Json(user))
}
