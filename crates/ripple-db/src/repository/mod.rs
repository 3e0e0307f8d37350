//! SurrealDB repository implementations.

mod invite;
mod magic_link;
mod permission;
mod referral;
mod session;
mod tenant;
mod user;

pub use invite::SurrealInviteRepository;
pub use magic_link::SurrealMagicLinkRepository;
pub use permission::SurrealPermissionRepository;
pub use referral::SurrealReferralRepository;
pub use session::SurrealSessionRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;
