//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation. Operations
//! documented as atomic must be implemented as a single store
//! transaction: a concurrent caller observes either the state before or
//! the state after, never an intermediate.

use uuid::Uuid;

use crate::error::RippleResult;
use crate::models::{
    invite::{CreateInviteToken, InviteToken},
    magic_link::{CreateMagicLink, MagicLink},
    permission::{Action, Module, PermissionOverride, SetPermissionOverride},
    referral::ReferralRelationship,
    session::{CreateSession, Session},
    tenant::{CreateTenant, Tenant, TenantStatus, UpdateTenant},
    user::{CreateUserProfile, UpdateUserProfile, UserProfile},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant (global scope)
// ---------------------------------------------------------------------------

/// Tenants are never hard-deleted; suspension is the off switch.
pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = RippleResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RippleResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = RippleResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = RippleResult<Tenant>> + Send;
    fn set_status(
        &self,
        id: Uuid,
        status: TenantStatus,
    ) -> impl Future<Output = RippleResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = RippleResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

/// User profiles are never deleted, so referral relationships never
/// dangle.
pub trait UserRepository: Send + Sync {
    fn create(
        &self,
        input: CreateUserProfile,
    ) -> impl Future<Output = RippleResult<UserProfile>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = RippleResult<UserProfile>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = RippleResult<UserProfile>> + Send;
    /// Case-insensitive lookup across all tenants; usernames are globally
    /// unique because referral links carry no tenant.
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = RippleResult<UserProfile>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> impl Future<Output = RippleResult<UserProfile>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = RippleResult<PaginatedResult<UserProfile>>> + Send;
    /// Every profile whose lineage path contains `ancestor_id`.
    fn list_descendants(
        &self,
        tenant_id: Uuid,
        ancestor_id: Uuid,
    ) -> impl Future<Output = RippleResult<Vec<UserProfile>>> + Send;
}

pub trait InviteRepository: Send + Sync {
    fn create(
        &self,
        input: CreateInviteToken,
    ) -> impl Future<Output = RippleResult<InviteToken>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = RippleResult<InviteToken>> + Send;
    /// Atomically flip `used` to true and create the accepted profile.
    ///
    /// Fails with `NotFound` for an unknown token and `Gone` if the token
    /// is already used or expired. Of two concurrent calls for the same
    /// token exactly one succeeds.
    fn consume(
        &self,
        token_hash: &str,
        profile: CreateUserProfile,
    ) -> impl Future<Output = RippleResult<UserProfile>> + Send;
    fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = RippleResult<PaginatedResult<InviteToken>>> + Send;
}

pub trait MagicLinkRepository: Send + Sync {
    fn create(
        &self,
        input: CreateMagicLink,
    ) -> impl Future<Output = RippleResult<MagicLink>> + Send;
    /// Atomically mark the link used if the hash and email match and it is
    /// unused and unexpired. Fails with `Gone` otherwise.
    fn consume(
        &self,
        token_hash: &str,
        email: &str,
    ) -> impl Future<Output = RippleResult<MagicLink>> + Send;
}

pub trait ReferralRepository: Send + Sync {
    /// Atomically create a referred profile and its relationship row.
    fn create_referred_user(
        &self,
        referrer_id: Uuid,
        profile: CreateUserProfile,
    ) -> impl Future<Output = RippleResult<(UserProfile, ReferralRelationship)>> + Send;
    fn list_by_referrer(
        &self,
        tenant_id: Uuid,
        referrer_id: Uuid,
    ) -> impl Future<Output = RippleResult<Vec<ReferralRelationship>>> + Send;
    fn get_by_referee(
        &self,
        tenant_id: Uuid,
        referee_id: Uuid,
    ) -> impl Future<Output = RippleResult<ReferralRelationship>> + Send;
}

pub trait PermissionRepository: Send + Sync {
    /// Overrides that apply to the user: those without a team plus those
    /// for `team_id` when given.
    fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        team_id: Option<Uuid>,
    ) -> impl Future<Output = RippleResult<Vec<PermissionOverride>>> + Send;
    /// Upsert on (tenant, user, team, module, action).
    fn set(
        &self,
        input: SetPermissionOverride,
    ) -> impl Future<Output = RippleResult<PermissionOverride>> + Send;
    fn remove(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        team_id: Option<Uuid>,
        module: Module,
        action: Action,
    ) -> impl Future<Output = RippleResult<()>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = RippleResult<Session>> + Send;
    /// Token hashes are unique platform-wide; the credential arrives
    /// before any tenant is known.
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = RippleResult<Session>> + Send;
    fn invalidate(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = RippleResult<()>> + Send;
    fn invalidate_user_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = RippleResult<()>> + Send;
    /// Remove expired sessions, returning how many were removed.
    fn cleanup_expired(&self) -> impl Future<Output = RippleResult<u64>> + Send;
}
