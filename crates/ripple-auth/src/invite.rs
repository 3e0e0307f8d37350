//! Invitation issuance, validation and one-time acceptance.

use chrono::Utc;
use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::identity::Identity;
use ripple_core::models::invite::{CreateInviteToken, InviteState, InviteToken};
use ripple_core::models::permission::{Action, Module};
use ripple_core::models::role::Role;
use ripple_core::models::tenant::{Tenant, TenantStatus};
use ripple_core::models::user::{CreateUserProfile, UserProfile, is_valid_username, normalize_email};
use ripple_core::repository::{
    InviteRepository, PaginatedResult, Pagination, PermissionRepository, TenantRepository,
    UserRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::access::AccessValidator;
use crate::config::AuthConfig;
use crate::email::{EmailSender, escape_html};
use crate::token;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInviteInput {
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<Uuid>,
}

/// Result of issuing an invite. `token` is the only copy of the raw
/// token; it is not stored.
#[derive(Debug, Clone)]
pub struct InviteIssued {
    pub invite: InviteToken,
    pub token: String,
    pub accept_url: String,
    pub delivered: bool,
}

/// Read-only report on an invite token, safe to show to its holder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InviteValidation {
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_used: bool,
    pub tenant: Option<Tenant>,
    pub invited_by_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub reason: Option<String>,
}

impl InviteValidation {
    fn invalid(reason: &str) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptInvite {
    pub external_identity_id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub struct InviteService<T, U, P, I, E>
where
    T: TenantRepository,
    U: UserRepository,
    P: PermissionRepository,
    I: InviteRepository,
    E: EmailSender,
{
    access: AccessValidator<T, U, P>,
    invite_repo: I,
    email: E,
    config: AuthConfig,
}

impl<T, U, P, I, E> InviteService<T, U, P, I, E>
where
    T: TenantRepository,
    U: UserRepository,
    P: PermissionRepository,
    I: InviteRepository,
    E: EmailSender,
{
    pub fn new(access: AccessValidator<T, U, P>, invite_repo: I, email: E, config: AuthConfig) -> Self {
        Self {
            access,
            invite_repo,
            email,
            config,
        }
    }

    fn tenants(&self) -> &T {
        self.access.tenants()
    }

    fn users(&self) -> &U {
        self.access.permissions().users()
    }

    fn accept_url(&self, raw_token: &str) -> String {
        self.config.app_url(&format!("/invite/{raw_token}"))
    }

    /// Issue an invite into the inviter's tenant and email it.
    pub async fn create(
        &self,
        inviter: &Identity,
        input: CreateInviteInput,
    ) -> RippleResult<InviteIssued> {
        if !inviter.role.is_administrative() {
            warn!(user_id = %inviter.user_id, "non admin attempted to invite");
            return Err(RippleError::forbidden("only admins can send invites"));
        }
        if inviter.role == Role::Admin && input.role == Role::SuperAdmin {
            return Err(RippleError::forbidden("admins cannot invite super admins"));
        }

        let email = normalize_email(&input.email);
        if !email.contains('@') {
            return Err(RippleError::validation("a valid email address is required"));
        }

        self.access
            .require(
                Some(inviter),
                inviter.tenant_id,
                Some((Module::Invitations, Action::Create)),
            )
            .await?;
        let tenant = self.tenants().get_by_id(inviter.tenant_id).await?;

        match self.users().get_by_email(tenant.id, &email).await {
            Ok(_) => return Err(RippleError::conflict("user_profile")),
            Err(RippleError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let raw = token::generate_token();
        let invite = self
            .invite_repo
            .create(CreateInviteToken {
                token_hash: token::hash_token(&raw),
                email: email.clone(),
                role: input.role,
                inviter_id: inviter.user_id,
                tenant_id: tenant.id,
                team_id: input.team_id,
                expires_at: Utc::now() + self.config.invite_ttl(),
            })
            .await?;

        let accept_url = self.accept_url(&raw);
        let inviter_name = self
            .users()
            .get_by_id(inviter.tenant_id, inviter.user_id)
            .await
            .map(|u| u.public_name().to_string())
            .unwrap_or_else(|_| inviter.email.clone());

        let subject = format!("You're invited to join {} on Ripple", tenant.name);
        let body = format!(
            "<p>{} invited you to join <strong>{}</strong> as {}.</p>\
             <p><a href=\"{}\">Accept your invitation</a></p>\
             <p>This link expires on {}.</p>",
            escape_html(&inviter_name),
            escape_html(&tenant.name),
            invite.role,
            escape_html(&accept_url),
            invite.expires_at.format("%Y-%m-%d %H:%M UTC"),
        );
        let delivered = match self.email.send(&email, &subject, &body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(invite_id = %invite.id, error = %e, "invite email not delivered");
                false
            }
        };

        info!(
            invite_id = %invite.id,
            tenant_id = %tenant.id,
            inviter = %inviter.user_id,
            role = %invite.role,
            delivered,
            "invite issued"
        );
        Ok(InviteIssued {
            invite,
            token: raw,
            accept_url,
            delivered,
        })
    }

    /// Invites issued in the actor's tenant, newest first. Admins only.
    pub async fn list(
        &self,
        actor: &Identity,
        pagination: Pagination,
    ) -> RippleResult<PaginatedResult<InviteToken>> {
        if !actor.role.is_administrative() {
            return Err(RippleError::forbidden("only admins can list invites"));
        }
        self.access
            .require(
                Some(actor),
                actor.tenant_id,
                Some((Module::Invitations, Action::View)),
            )
            .await?;
        self.invite_repo
            .list_for_tenant(actor.tenant_id, pagination)
            .await
    }

    /// Report on a token without changing anything. Never fails: store
    /// errors are logged and reported as an invalid invite.
    pub async fn validate(&self, raw_token: &str) -> InviteValidation {
        let invite = match self
            .invite_repo
            .get_by_token_hash(&token::hash_token(raw_token))
            .await
        {
            Ok(invite) => invite,
            Err(RippleError::NotFound { .. }) => return InviteValidation::invalid("invite not found"),
            Err(e) => {
                error!(error = %e, "invite lookup failed");
                return InviteValidation::invalid("unable to validate invite");
            }
        };

        let tenant = match self.tenants().get_by_id(invite.tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) => {
                error!(invite_id = %invite.id, error = %e, "invite tenant lookup failed");
                return InviteValidation::invalid("unable to validate invite");
            }
        };

        let invited_by_name = self
            .users()
            .get_by_id(invite.tenant_id, invite.inviter_id)
            .await
            .ok()
            .map(|u| u.public_name().to_string());

        let state = invite.state_at(Utc::now(), tenant.status);
        let reason = match state {
            InviteState::Valid => None,
            InviteState::Expired => Some("invite has expired"),
            InviteState::Used => Some("invite has already been used"),
            InviteState::TenantSuspended => Some("tenant is suspended"),
        };

        InviteValidation {
            is_valid: state == InviteState::Valid,
            is_expired: invite.is_expired_at(Utc::now()),
            is_used: invite.used,
            tenant: Some(tenant),
            invited_by_name,
            email: Some(invite.email),
            role: Some(invite.role),
            reason: reason.map(str::to_string),
        }
    }

    /// Accept an invite, creating the invited profile. Of two concurrent
    /// calls with the same token exactly one succeeds.
    pub async fn consume(&self, raw_token: &str, accept: AcceptInvite) -> RippleResult<UserProfile> {
        let token_hash = token::hash_token(raw_token);
        let invite = self.invite_repo.get_by_token_hash(&token_hash).await?;

        let tenant = self.tenants().get_by_id(invite.tenant_id).await?;
        if tenant.status == TenantStatus::Suspended {
            return Err(RippleError::TenantSuspended);
        }
        match invite.state_at(Utc::now(), tenant.status) {
            InviteState::Used => return Err(RippleError::gone("invite has already been used")),
            InviteState::Expired => return Err(RippleError::gone("invite has expired")),
            InviteState::Valid | InviteState::TenantSuspended => {}
        }

        let username = accept.username.trim().to_string();
        if !is_valid_username(&username) {
            return Err(RippleError::validation(
                "username must be 3-32 characters of letters, digits, '_', '-' or '.'",
            ));
        }
        if accept.external_identity_id.trim().is_empty() {
            return Err(RippleError::validation("external identity id is required"));
        }

        let user = self
            .invite_repo
            .consume(
                &token_hash,
                CreateUserProfile {
                    tenant_id: invite.tenant_id,
                    external_identity_id: accept.external_identity_id,
                    username,
                    email: invite.email.clone(),
                    display_name: accept.display_name,
                    team_id: invite.team_id,
                    role: invite.role,
                    lineage_path: Vec::new(),
                    invite_verified: true,
                },
            )
            .await?;

        info!(
            invite_id = %invite.id,
            tenant_id = %user.tenant_id,
            user_id = %user.id,
            role = %user.role,
            "invite consumed"
        );
        Ok(user)
    }
}
