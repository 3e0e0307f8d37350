//! Ripple Server: HTTP surface over the auth, tenant, invite, magic link,
//! referral and permission services.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ServerArgs, ServerConfig};
pub use error::{ApiError, ErrorResponse};
pub use routes::build_router;
pub use state::{AppState, Mailer};
