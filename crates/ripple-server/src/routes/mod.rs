//! API routes
//!
//! Domain-grouped HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod invites;
pub mod ops;
pub mod referrals;
pub mod tenants;

use axum::Router;

use crate::state::AppState;

/// Build the complete router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(tenants::routes())
        .merge(invites::routes())
        .merge(auth::routes())
        .merge(referrals::api_routes())
        .merge(admin::routes());

    Router::new()
        .merge(ops::routes())
        .nest("/api", api)
        .merge(referrals::public_routes())
        .with_state(state)
}
