//! Permission engine: role defaults plus per-user overrides.

use std::collections::BTreeSet;

use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::identity::Identity;
use ripple_core::models::permission::{
    Action, Module, PermissionKey, PermissionOverride, Polarity, SetPermissionOverride,
};
use ripple_core::models::role::Role;
use ripple_core::policy::role_permissions;
use ripple_core::repository::{PermissionRepository, UserRepository};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// The permission picture for one user at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct EffectivePermissions {
    pub role: Role,
    pub role_permissions: BTreeSet<PermissionKey>,
    pub custom_permissions: BTreeSet<PermissionKey>,
    pub denied_permissions: BTreeSet<PermissionKey>,
}

impl EffectivePermissions {
    pub fn from_overrides(role: Role, overrides: &[PermissionOverride]) -> Self {
        let mut custom_permissions = BTreeSet::new();
        let mut denied_permissions = BTreeSet::new();
        for o in overrides {
            match o.polarity {
                Polarity::Granted => custom_permissions.insert(o.key()),
                Polarity::Denied => denied_permissions.insert(o.key()),
            };
        }
        Self {
            role,
            role_permissions: role_permissions(role),
            custom_permissions,
            denied_permissions,
        }
    }

    /// `(role ∪ custom) ∖ denied`. A denial always wins.
    pub fn is_allowed(&self, module: Module, action: Action) -> bool {
        let key = PermissionKey::new(module, action);
        (self.role_permissions.contains(&key) || self.custom_permissions.contains(&key))
            && !self.denied_permissions.contains(&key)
    }

    /// Every pair the user can exercise.
    pub fn allowed(&self) -> BTreeSet<PermissionKey> {
        self.role_permissions
            .union(&self.custom_permissions)
            .filter(|k| !self.denied_permissions.contains(k))
            .copied()
            .collect()
    }
}

pub struct PermissionEngine<U: UserRepository, P: PermissionRepository> {
    user_repo: U,
    permission_repo: P,
}

impl<U: UserRepository, P: PermissionRepository> PermissionEngine<U, P> {
    pub fn new(user_repo: U, permission_repo: P) -> Self {
        Self {
            user_repo,
            permission_repo,
        }
    }

    pub(crate) fn users(&self) -> &U {
        &self.user_repo
    }

    /// Evaluate a stored user. When `team_id` is `None` the profile's own
    /// team is used.
    pub async fn evaluate(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        team_id: Option<Uuid>,
    ) -> RippleResult<EffectivePermissions> {
        let user = self.user_repo.get_by_id(tenant_id, user_id).await?;
        let overrides = self
            .permission_repo
            .list_for_user(tenant_id, user_id, team_id.or(user.team_id))
            .await?;
        Ok(EffectivePermissions::from_overrides(user.role, &overrides))
    }

    /// Evaluate an already-resolved identity without reloading its profile.
    pub async fn evaluate_identity(
        &self,
        identity: &Identity,
    ) -> RippleResult<EffectivePermissions> {
        let overrides = self
            .permission_repo
            .list_for_user(identity.tenant_id, identity.user_id, identity.team_id)
            .await?;
        Ok(EffectivePermissions::from_overrides(identity.role, &overrides))
    }

    async fn ensure_can_manage(&self, actor: &Identity, tenant_id: Uuid) -> RippleResult<()> {
        let admin_here = actor.is_super_admin()
            || (actor.role == Role::Admin && actor.tenant_id == tenant_id);
        if !admin_here {
            return Err(RippleError::forbidden(
                "only tenant admins can manage permissions",
            ));
        }
        let effective = self.evaluate_identity(actor).await?;
        if !effective.is_allowed(Module::UserManagement, Action::Manage) {
            return Err(RippleError::forbidden("user_management:manage is denied"));
        }
        Ok(())
    }

    /// Grant or deny one pair for a user of the tenant.
    pub async fn set_override(
        &self,
        actor: &Identity,
        input: SetPermissionOverride,
    ) -> RippleResult<PermissionOverride> {
        self.ensure_can_manage(actor, input.tenant_id).await?;
        // The target must belong to the tenant.
        self.user_repo.get_by_id(input.tenant_id, input.user_id).await?;

        let record = self.permission_repo.set(input).await?;
        info!(
            tenant_id = %record.tenant_id,
            user_id = %record.user_id,
            permission = %record.key(),
            polarity = record.polarity.as_str(),
            actor = %actor.user_id,
            "permission override set"
        );
        Ok(record)
    }

    pub async fn clear_override(
        &self,
        actor: &Identity,
        tenant_id: Uuid,
        user_id: Uuid,
        team_id: Option<Uuid>,
        key: PermissionKey,
    ) -> RippleResult<()> {
        self.ensure_can_manage(actor, tenant_id).await?;
        self.permission_repo
            .remove(tenant_id, user_id, team_id, key.module, key.action)
            .await?;
        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            permission = %key,
            actor = %actor.user_id,
            "permission override cleared"
        );
        Ok(())
    }
}
