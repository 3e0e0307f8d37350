//! Access validation: authentication, tenant isolation, tenant status and
//! permission checks, evaluated in that order.

use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::identity::Identity;
use ripple_core::models::permission::{Action, Module};
use ripple_core::models::role::Role;
use ripple_core::models::user::{UpdateUserProfile, UserProfile};
use ripple_core::repository::{
    Pagination, PermissionRepository, TenantRepository, UserRepository,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::permission::PermissionEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    CrossTenant,
    TenantSuspended,
    InsufficientPermission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert a denial into the error taxonomy.
    pub fn into_result(self) -> RippleResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::Unauthenticated) => Err(RippleError::Unauthenticated),
            Self::Deny(DenyReason::CrossTenant) => Err(RippleError::CrossTenant),
            Self::Deny(DenyReason::TenantSuspended) => Err(RippleError::TenantSuspended),
            Self::Deny(DenyReason::InsufficientPermission) => {
                Err(RippleError::forbidden("insufficient permission"))
            }
        }
    }
}

pub struct AccessValidator<T, U, P>
where
    T: TenantRepository,
    U: UserRepository,
    P: PermissionRepository,
{
    tenant_repo: T,
    permissions: PermissionEngine<U, P>,
}

impl<T, U, P> AccessValidator<T, U, P>
where
    T: TenantRepository,
    U: UserRepository,
    P: PermissionRepository,
{
    pub fn new(tenant_repo: T, permissions: PermissionEngine<U, P>) -> Self {
        Self {
            tenant_repo,
            permissions,
        }
    }

    pub fn permissions(&self) -> &PermissionEngine<U, P> {
        &self.permissions
    }

    pub(crate) fn tenants(&self) -> &T {
        &self.tenant_repo
    }

    /// Decide whether `identity` may act in `tenant_id`, optionally
    /// requiring one permission pair.
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        tenant_id: Uuid,
        required: Option<(Module, Action)>,
    ) -> RippleResult<AccessDecision> {
        let Some(identity) = identity else {
            return Ok(AccessDecision::Deny(DenyReason::Unauthenticated));
        };

        if !identity.is_super_admin() && identity.tenant_id != tenant_id {
            warn!(
                user_id = %identity.user_id,
                home_tenant = %identity.tenant_id,
                tenant_id = %tenant_id,
                "cross-tenant access denied"
            );
            return Ok(AccessDecision::Deny(DenyReason::CrossTenant));
        }

        let tenant = match self.tenant_repo.get_by_id(tenant_id).await {
            Ok(tenant) => tenant,
            // Do not reveal whether the tenant exists.
            Err(RippleError::NotFound { .. }) if !identity.is_super_admin() => {
                return Ok(AccessDecision::Deny(DenyReason::CrossTenant));
            }
            Err(e) => return Err(e),
        };
        if !tenant.is_active() {
            return Ok(AccessDecision::Deny(DenyReason::TenantSuspended));
        }

        if let Some((module, action)) = required {
            let effective = self.permissions.evaluate_identity(identity).await?;
            if !effective.is_allowed(module, action) {
                warn!(
                    user_id = %identity.user_id,
                    tenant_id = %tenant_id,
                    module = module.as_str(),
                    action = action.as_str(),
                    "permission denied"
                );
                return Ok(AccessDecision::Deny(DenyReason::InsufficientPermission));
            }
        }

        Ok(AccessDecision::Allow)
    }

    /// Like [`authorize`](Self::authorize) but fails on denial. Returns the
    /// identity for convenient chaining.
    pub async fn require<'a>(
        &self,
        identity: Option<&'a Identity>,
        tenant_id: Uuid,
        required: Option<(Module, Action)>,
    ) -> RippleResult<&'a Identity> {
        self.authorize(identity, tenant_id, required)
            .await?
            .into_result()?;
        identity.ok_or(RippleError::Unauthenticated)
    }

    async fn all_users(&self, tenant_id: Uuid) -> RippleResult<Vec<UserProfile>> {
        let mut users = Vec::new();
        let mut pagination = Pagination {
            offset: 0,
            limit: 200,
        };
        loop {
            let page = self
                .permissions
                .users()
                .list(tenant_id, pagination.clone())
                .await?;
            let fetched = page.items.len() as u64;
            users.extend(page.items);
            if fetched < pagination.limit || users.len() as u64 >= page.total {
                return Ok(users);
            }
            pagination.offset += fetched;
        }
    }

    /// Users of `tenant_id` that `actor` may view as. Admins of the tenant
    /// and super admins only; super admin profiles are never listed.
    pub async fn list_impersonation_targets(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
    ) -> RippleResult<Vec<UserProfile>> {
        let allowed = actor.is_super_admin()
            || (actor.role == Role::Admin && actor.tenant_id == tenant_id);
        if !allowed {
            return Err(RippleError::forbidden(
                "only admins can list impersonation targets",
            ));
        }
        self.require(
            Some(actor),
            tenant_id,
            Some((Module::UserManagement, Action::View)),
        )
        .await?;

        Ok(self
            .all_users(tenant_id)
            .await?
            .into_iter()
            .filter(|u| u.role != Role::SuperAdmin)
            .collect())
    }

    /// Change another user's role.
    ///
    /// Admins act only inside their own tenant, cannot grant super admin
    /// and cannot touch users ranked admin or above. Nobody changes their
    /// own role.
    pub async fn change_role(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        user_id: Uuid,
        new_role: Role,
    ) -> RippleResult<UserProfile> {
        if !actor.role.is_administrative() {
            return Err(RippleError::forbidden("only admins can change roles"));
        }
        if actor.user_id == user_id {
            return Err(AuthError::SelfRoleChange.into());
        }
        self.require(
            Some(actor),
            tenant_id,
            Some((Module::UserManagement, Action::Manage)),
        )
        .await?;

        let target = self.permissions.users().get_by_id(tenant_id, user_id).await?;

        if actor.role == Role::Admin {
            if new_role == Role::SuperAdmin {
                return Err(RippleError::forbidden("admins cannot assign super admin"));
            }
            if !actor.role.outranks(target.role) {
                return Err(RippleError::forbidden(
                    "cannot modify a user of equal or higher rank",
                ));
            }
        }

        let updated = self
            .permissions
            .users()
            .update(
                tenant_id,
                user_id,
                UpdateUserProfile {
                    role: Some(new_role),
                    ..UpdateUserProfile::default()
                },
            )
            .await?;
        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            from = %target.role,
            to = %new_role,
            actor = %actor.user_id,
            "role changed"
        );
        Ok(updated)
    }
}
