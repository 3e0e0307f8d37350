//! Tenant endpoints
//!
//! - `GET /api/tenants/resolve?slug=|domain=` - public tenant lookup
//! - `GET /api/tenants/{tenant_id}/access` - does the caller belong here
//! - `POST /api/tenants` - provision (super admin)
//! - `PATCH /api/tenants/{tenant_id}` - settings (tenant admin)
//! - `PUT /api/tenants/{tenant_id}/status` - suspend/reactivate (super admin)

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use ripple_auth::TenantLookup;
use ripple_core::models::tenant::{CreateTenant, Tenant, TenantStatus, UpdateTenant};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::{ApiError, Result};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants", post(provision_tenant))
        .route("/tenants/resolve", get(resolve_tenant))
        .route("/tenants/{tenant_id}", patch(update_tenant))
        .route("/tenants/{tenant_id}/access", get(tenant_access))
        .route("/tenants/{tenant_id}/status", put(set_tenant_status))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub slug: Option<String>,
    pub domain: Option<String>,
}

async fn resolve_tenant(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<Tenant>> {
    let (identifier, lookup) = match (query.slug, query.domain) {
        (Some(slug), _) => (slug, TenantLookup::Slug),
        (None, Some(domain)) => (domain, TenantLookup::Domain),
        (None, None) => return Err(ApiError::bad_request("slug or domain is required")),
    };
    let tenant = state.services().tenants.resolve(&identifier, lookup).await?;
    Ok(Json(tenant))
}

#[derive(Debug, Serialize)]
pub struct TenantAccessResponse {
    pub tenant_id: Uuid,
    pub has_access: bool,
}

async fn tenant_access(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantAccessResponse>> {
    let has_access = state
        .services()
        .tenants
        .validate_user_tenant_access(identity.user_id, tenant_id)
        .await?;
    Ok(Json(TenantAccessResponse {
        tenant_id,
        has_access,
    }))
}

async fn provision_tenant(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Json(input): Json<CreateTenant>,
) -> Result<(StatusCode, Json<Tenant>)> {
    let tenant = state
        .services()
        .tenant_admin
        .provision(&identity, input)
        .await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

async fn update_tenant(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Path(tenant_id): Path<Uuid>,
    Json(update): Json<UpdateTenant>,
) -> Result<Json<Tenant>> {
    let tenant = state
        .services()
        .tenant_admin
        .update_settings(&identity, tenant_id, update)
        .await?;
    Ok(Json(tenant))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TenantStatus,
}

async fn set_tenant_status(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Tenant>> {
    let tenant = state
        .services()
        .tenant_admin
        .set_status(&identity, tenant_id, request.status)
        .await?;
    Ok(Json(tenant))
}
