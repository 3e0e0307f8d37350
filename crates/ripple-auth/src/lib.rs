//! Ripple Auth: credential resolution, tenant resolution and access
//! validation, the permission engine, and the invite, magic link and
//! referral flows.
//!
//! Services are generic over the `ripple-core` repository traits and hold
//! no mutable state between calls.

pub mod access;
pub mod config;
pub mod email;
pub mod error;
pub mod identity;
pub mod invite;
pub mod magic_link;
pub mod permission;
pub mod referral;
pub mod tenant;
pub mod token;

pub use access::{AccessDecision, AccessValidator, DenyReason};
pub use config::AuthConfig;
pub use email::{EmailError, EmailSender, LogEmailSender, MemoryEmailSender};
pub use error::AuthError;
pub use identity::{
    Credential, CredentialResolver, DevBypassSource, IdentitySource, SessionIdentitySource,
};
pub use invite::InviteService;
pub use magic_link::MagicLinkService;
pub use permission::{EffectivePermissions, PermissionEngine};
pub use referral::ReferralService;
pub use tenant::{TenantAdmin, TenantLookup, TenantResolver};
