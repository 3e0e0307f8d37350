//! Tenant resolution, membership checks and tenant administration.

use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::identity::Identity;
use ripple_core::models::permission::{Action, Module};
use ripple_core::models::role::Role;
use ripple_core::models::tenant::{
    CreateTenant, SYSTEM_TENANT_SLUG, Tenant, TenantStatus, UpdateTenant, is_valid_slug,
};
use ripple_core::repository::{PermissionRepository, TenantRepository, UserRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::AccessValidator;

/// How a tenant identifier should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantLookup {
    Slug,
    Domain,
}

/// Reduce a host name or URL to the slug it maps to: lower-case, strip
/// scheme, path and port, keep the leading DNS label.
///
/// `acme.example.com` → `acme`. Multi-label custom domains such as
/// `referrals.acme.co.uk` resolve to `referrals`, which is a known gap.
pub fn domain_to_slug(domain: &str) -> String {
    let lowered = domain.trim().to_ascii_lowercase();
    let without_scheme = lowered
        .split_once("://")
        .map_or(lowered.as_str(), |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next().unwrap_or_default();
    host.split('.').next().unwrap_or_default().to_string()
}

/// Maps identifiers to tenants and answers membership questions. Reads
/// are always fresh from the store.
pub struct TenantResolver<T: TenantRepository, U: UserRepository> {
    tenant_repo: T,
    user_repo: U,
}

impl<T: TenantRepository, U: UserRepository> TenantResolver<T, U> {
    pub fn new(tenant_repo: T, user_repo: U) -> Self {
        Self {
            tenant_repo,
            user_repo,
        }
    }

    pub async fn resolve(&self, identifier: &str, lookup: TenantLookup) -> RippleResult<Tenant> {
        let slug = match lookup {
            TenantLookup::Slug => identifier.trim().to_ascii_lowercase(),
            TenantLookup::Domain => domain_to_slug(identifier),
        };
        if slug.is_empty() {
            return Err(RippleError::validation("tenant identifier is empty"));
        }
        self.tenant_repo.get_by_slug(&slug).await
    }

    /// True iff a profile with this `(user_id, tenant_id)` pair exists and
    /// the tenant is not suspended.
    pub async fn validate_user_tenant_access(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> RippleResult<bool> {
        let tenant = match self.tenant_repo.get_by_id(tenant_id).await {
            Ok(tenant) => tenant,
            Err(RippleError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        if tenant.status == TenantStatus::Suspended {
            return Ok(false);
        }
        match self.user_repo.get_by_id(tenant_id, user_id).await {
            Ok(_) => Ok(true),
            Err(RippleError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Provisioning and settings for tenants.
pub struct TenantAdmin<T, U, P>
where
    T: TenantRepository,
    U: UserRepository,
    P: PermissionRepository,
{
    access: AccessValidator<T, U, P>,
}

impl<T, U, P> TenantAdmin<T, U, P>
where
    T: TenantRepository,
    U: UserRepository,
    P: PermissionRepository,
{
    pub fn new(access: AccessValidator<T, U, P>) -> Self {
        Self { access }
    }

    /// Create a tenant. Super admins only.
    pub async fn provision(&self, actor: &Identity, mut input: CreateTenant) -> RippleResult<Tenant> {
        if !actor.is_super_admin() {
            warn!(user_id = %actor.user_id, "non super admin attempted tenant provisioning");
            return Err(RippleError::forbidden("only super admins can provision tenants"));
        }
        input.slug = input.slug.trim().to_ascii_lowercase();
        if !is_valid_slug(&input.slug) {
            return Err(RippleError::validation(format!(
                "invalid tenant slug: {}",
                input.slug
            )));
        }
        if input.slug == SYSTEM_TENANT_SLUG {
            return Err(RippleError::validation("tenant slug is reserved"));
        }
        if input.name.trim().is_empty() {
            return Err(RippleError::validation("tenant name is required"));
        }

        let tenant = self.access.tenants().create(input).await?;
        info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant provisioned");
        Ok(tenant)
    }

    /// Update name, domain, plan or branding. Admins of the tenant or
    /// super admins.
    pub async fn update_settings(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        update: UpdateTenant,
    ) -> RippleResult<Tenant> {
        let allowed = actor.is_super_admin()
            || (actor.role == Role::Admin && actor.tenant_id == tenant_id);
        if !allowed {
            return Err(RippleError::forbidden(
                "only tenant admins can change tenant settings",
            ));
        }
        self.access
            .require(Some(actor), tenant_id, Some((Module::Settings, Action::Edit)))
            .await?;
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(RippleError::validation("tenant name is required"));
        }

        let tenant = self.access.tenants().update(tenant_id, update).await?;
        info!(tenant_id = %tenant.id, "tenant settings updated");
        Ok(tenant)
    }

    /// Suspend or reactivate a tenant. Super admins only; this is the one
    /// tenant operation that works on a suspended tenant.
    pub async fn set_status(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        status: TenantStatus,
    ) -> RippleResult<Tenant> {
        if !actor.is_super_admin() {
            return Err(RippleError::forbidden(
                "only super admins can change tenant status",
            ));
        }
        let tenant = self.access.tenants().set_status(tenant_id, status).await?;
        info!(tenant_id = %tenant.id, status = ?tenant.status, "tenant status changed");
        Ok(tenant)
    }
}
