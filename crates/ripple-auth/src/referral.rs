//! Public referral links, link visits and referred signups.

use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::identity::Identity;
use ripple_core::models::referral::ReferralRelationship;
use ripple_core::models::role::Role;
use ripple_core::models::user::{
    CreateUserProfile, UserProfile, is_valid_username, normalize_email,
};
use ripple_core::repository::{ReferralRepository, TenantRepository, UserRepository};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralLink {
    pub username: String,
    pub url: String,
}

/// Where a visitor of `/r/{username}` is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralRedirect {
    /// Generic error landing; the cause is deliberately not disclosed.
    Landing(String),
    /// Signed-in visitor; nothing is recorded.
    Dashboard(String),
    Signup(String),
}

impl ReferralRedirect {
    pub fn url(&self) -> &str {
        match self {
            Self::Landing(url) | Self::Dashboard(url) | Self::Signup(url) => url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferralSignup {
    pub referrer_username: String,
    pub email: String,
    pub username: String,
    pub external_identity_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownlineEntry {
    pub user: UserProfile,
    /// 1 for a direct referral, 2 for a referral of a referral, ...
    pub tier: usize,
}

pub struct ReferralService<T, U, R>
where
    T: TenantRepository,
    U: UserRepository,
    R: ReferralRepository,
{
    tenant_repo: T,
    user_repo: U,
    referral_repo: R,
    config: AuthConfig,
}

impl<T, U, R> ReferralService<T, U, R>
where
    T: TenantRepository,
    U: UserRepository,
    R: ReferralRepository,
{
    pub fn new(tenant_repo: T, user_repo: U, referral_repo: R, config: AuthConfig) -> Self {
        Self {
            tenant_repo,
            user_repo,
            referral_repo,
            config,
        }
    }

    fn link_url(&self, username: &str) -> String {
        format!(
            "{}/{}",
            self.config.referral_base_url.trim_end_matches('/'),
            urlencoding::encode(username)
        )
    }

    async fn tenant_is_active(&self, tenant_id: uuid::Uuid) -> RippleResult<bool> {
        Ok(self.tenant_repo.get_by_id(tenant_id).await?.is_active())
    }

    /// The caller's shareable link.
    pub async fn link_for(&self, identity: &Identity) -> RippleResult<ReferralLink> {
        if !identity.role.is_referral_eligible() {
            return Err(AuthError::RoleNotEligible(identity.role.to_string()).into());
        }
        if !self.tenant_is_active(identity.tenant_id).await? {
            return Err(AuthError::TenantInactive.into());
        }
        let user = self
            .user_repo
            .get_by_id(identity.tenant_id, identity.user_id)
            .await?;

        Ok(ReferralLink {
            url: self.link_url(&user.username),
            username: user.username,
        })
    }

    async fn eligible_referrer(&self, username: &str) -> RippleResult<Option<UserProfile>> {
        let referrer = match self.user_repo.get_by_username(username).await {
            Ok(user) => user,
            Err(RippleError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !referrer.role.is_referral_eligible() || !self.tenant_is_active(referrer.tenant_id).await? {
            return Ok(None);
        }
        Ok(Some(referrer))
    }

    /// Decide where a visitor of `username`'s link goes. Never fails: every
    /// problem ends on the same generic landing page.
    pub async fn visit(&self, username: &str, session: Option<&Identity>) -> ReferralRedirect {
        let landing = || ReferralRedirect::Landing(self.config.app_url("/?error=invalid_referral"));

        let referrer = match self.eligible_referrer(username).await {
            Ok(Some(referrer)) => referrer,
            Ok(None) => {
                info!("referral link visit did not match an eligible referrer");
                return landing();
            }
            Err(e) => {
                error!(error = %e, "referral link lookup failed");
                return landing();
            }
        };

        let code = urlencoding::encode(&referrer.username).into_owned();
        let referrer_role = referrer.role.as_str();
        match session {
            Some(_) => ReferralRedirect::Dashboard(self.config.app_url(&format!(
                "/dashboard?ref={code}&referrer_role={referrer_role}"
            ))),
            None => ReferralRedirect::Signup(self.config.app_url(&format!(
                "/signup?ref={code}&target_role={}&referrer_role={referrer_role}",
                Role::Customer.as_str()
            ))),
        }
    }

    /// Create a customer referred by `referrer_username`. The profile and
    /// the referral edge are written together or not at all.
    pub async fn complete_signup(&self, signup: ReferralSignup) -> RippleResult<UserProfile> {
        let referrer = self
            .eligible_referrer(&signup.referrer_username)
            .await?
            .ok_or_else(|| RippleError::not_found("referrer", &signup.referrer_username))?;

        let email = normalize_email(&signup.email);
        if !email.contains('@') {
            return Err(RippleError::validation("a valid email address is required"));
        }
        if email == referrer.email || signup.external_identity_id == referrer.external_identity_id {
            warn!(referrer = %referrer.id, "self-referral rejected");
            return Err(AuthError::SelfReferral.into());
        }
        let username = signup.username.trim().to_string();
        if !is_valid_username(&username) {
            return Err(RippleError::validation(
                "username must be 3-32 characters of letters, digits, '_', '-' or '.'",
            ));
        }
        match self.user_repo.get_by_email(referrer.tenant_id, &email).await {
            Ok(_) => return Err(RippleError::conflict("user_profile")),
            Err(RippleError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let (user, relationship) = self
            .referral_repo
            .create_referred_user(
                referrer.id,
                CreateUserProfile {
                    tenant_id: referrer.tenant_id,
                    external_identity_id: signup.external_identity_id,
                    username,
                    email,
                    display_name: signup.display_name,
                    team_id: None,
                    role: Role::Customer,
                    lineage_path: referrer.child_lineage(),
                    invite_verified: false,
                },
            )
            .await?;

        info!(
            tenant_id = %user.tenant_id,
            referrer = %relationship.referrer_id,
            referee = %relationship.referee_id,
            depth = user.lineage_path.len(),
            "referred signup completed"
        );
        Ok(user)
    }

    /// Everyone below the caller in the referral tree, nearest first.
    pub async fn downline(&self, identity: &Identity) -> RippleResult<Vec<DownlineEntry>> {
        let mut entries: Vec<DownlineEntry> = self
            .user_repo
            .list_descendants(identity.tenant_id, identity.user_id)
            .await?
            .into_iter()
            .filter_map(|user| {
                let position = user
                    .lineage_path
                    .iter()
                    .position(|id| *id == identity.user_id)?;
                Some(DownlineEntry {
                    tier: user.lineage_path.len() - position,
                    user,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| a.user.created_at.cmp(&b.user.created_at))
        });
        Ok(entries)
    }

    /// Direct referral edges created by the caller.
    pub async fn referrals_made(&self, identity: &Identity) -> RippleResult<Vec<ReferralRelationship>> {
        self.referral_repo
            .list_by_referrer(identity.tenant_id, identity.user_id)
            .await
    }
}
