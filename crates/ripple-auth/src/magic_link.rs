//! Passwordless sign-in and sign-up links.
//!
//! Links are store-backed, single use and live at most 15 minutes. A
//! sign-in request for an unknown email gets the same answer as a known
//! one so that the endpoint cannot be used to enumerate accounts.

use chrono::{DateTime, Utc};
use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::magic_link::{CreateMagicLink, MagicLinkIntent};
use ripple_core::models::user::{UserProfile, normalize_email};
use ripple_core::repository::{
    MagicLinkRepository, SessionRepository, TenantRepository, UserRepository,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::email::{EmailSender, escape_html};
use crate::identity::create_session;
use crate::token;

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
    pub tenant_slug: String,
    pub intent: MagicLinkIntent,
    /// Relative path to return to after verification.
    #[serde(default)]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MagicLinkDispatch {
    pub expires_at: DateTime<Utc>,
    /// Internal only; must not be echoed to the requester.
    pub delivered: bool,
}

#[derive(Debug, Clone)]
pub struct MagicLinkVerification {
    pub email: String,
    pub tenant_id: Uuid,
    pub intent: MagicLinkIntent,
    pub redirect_to: Option<String>,
    pub user: Option<UserProfile>,
    /// Raw session token, set when a sign-in established a session.
    pub session_token: Option<String>,
}

/// Only same-site relative paths are accepted as redirect targets.
pub fn is_safe_redirect(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

pub struct MagicLinkService<T, U, M, S, E>
where
    T: TenantRepository,
    U: UserRepository,
    M: MagicLinkRepository,
    S: SessionRepository,
    E: EmailSender,
{
    tenant_repo: T,
    user_repo: U,
    link_repo: M,
    session_repo: S,
    email: E,
    config: AuthConfig,
}

impl<T, U, M, S, E> MagicLinkService<T, U, M, S, E>
where
    T: TenantRepository,
    U: UserRepository,
    M: MagicLinkRepository,
    S: SessionRepository,
    E: EmailSender,
{
    pub fn new(
        tenant_repo: T,
        user_repo: U,
        link_repo: M,
        session_repo: S,
        email: E,
        config: AuthConfig,
    ) -> Self {
        Self {
            tenant_repo,
            user_repo,
            link_repo,
            session_repo,
            email,
            config,
        }
    }

    async fn profile(&self, tenant_id: Uuid, email: &str) -> RippleResult<Option<UserProfile>> {
        match self.user_repo.get_by_email(tenant_id, email).await {
            Ok(user) => Ok(Some(user)),
            Err(RippleError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn send(&self, request: MagicLinkRequest) -> RippleResult<MagicLinkDispatch> {
        let email = normalize_email(&request.email);
        if !email.contains('@') {
            return Err(RippleError::validation("a valid email address is required"));
        }
        if let Some(path) = &request.redirect_to
            && !is_safe_redirect(path)
        {
            return Err(RippleError::validation("redirect_to must be a relative path"));
        }

        let tenant = self
            .tenant_repo
            .get_by_slug(&request.tenant_slug.trim().to_ascii_lowercase())
            .await?;
        let expires_at = Utc::now() + self.config.magic_link_ttl();
        let withheld = MagicLinkDispatch {
            expires_at,
            delivered: false,
        };

        // Same answer as a sent link; the requester learns nothing about
        // the tenant's status or the address.
        if !tenant.is_active() {
            warn!(tenant_id = %tenant.id, "magic link requested for suspended tenant");
            return Ok(withheld);
        }
        if request.intent == MagicLinkIntent::SignIn
            && self.profile(tenant.id, &email).await?.is_none()
        {
            info!(tenant_id = %tenant.id, "sign-in link requested for unknown email");
            return Ok(withheld);
        }

        let raw = token::generate_token();
        let link = self
            .link_repo
            .create(CreateMagicLink {
                token_hash: token::hash_token(&raw),
                email: email.clone(),
                tenant_id: tenant.id,
                intent: request.intent,
                redirect_to: request.redirect_to,
                expires_at,
            })
            .await?;

        let url = self.config.app_url(&format!(
            "/auth/magic-link?token={}&email={}",
            urlencoding::encode(&raw),
            urlencoding::encode(&email),
        ));
        let (subject, action) = match link.intent {
            MagicLinkIntent::SignIn => (format!("Sign in to {}", tenant.name), "Sign in"),
            MagicLinkIntent::SignUp => (format!("Finish joining {}", tenant.name), "Create your account"),
        };
        let body = format!(
            "<p><a href=\"{}\">{action}</a></p>\
             <p>This link works once and expires in {} minutes.</p>",
            escape_html(&url),
            self.config.magic_link_ttl().num_minutes(),
        );

        let delivered = match self.email.send(&email, &subject, &body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(link_id = %link.id, error = %e, "magic link email not delivered");
                false
            }
        };

        info!(
            link_id = %link.id,
            tenant_id = %tenant.id,
            intent = %link.intent,
            delivered,
            "magic link issued"
        );
        Ok(MagicLinkDispatch {
            expires_at: link.expires_at,
            delivered,
        })
    }

    /// Consume a link. Fails with `Gone` unless the token and email match
    /// an unused, unexpired link.
    pub async fn verify(&self, raw_token: &str, email: &str) -> RippleResult<MagicLinkVerification> {
        let link = self
            .link_repo
            .consume(&token::hash_token(raw_token), email)
            .await?;

        let tenant = self.tenant_repo.get_by_id(link.tenant_id).await?;
        if !tenant.is_active() {
            return Err(RippleError::TenantSuspended);
        }

        let user = self.profile(link.tenant_id, &link.email).await?;
        let session_token = match (&user, link.intent) {
            (Some(user), MagicLinkIntent::SignIn) => Some(
                create_session(&self.session_repo, &self.config, user, None, None)
                    .await?
                    .token,
            ),
            _ => None,
        };

        info!(
            link_id = %link.id,
            tenant_id = %link.tenant_id,
            intent = %link.intent,
            signed_in = session_token.is_some(),
            "magic link verified"
        );
        Ok(MagicLinkVerification {
            email: link.email,
            tenant_id: link.tenant_id,
            intent: link.intent,
            redirect_to: link.redirect_to,
            user,
            session_token,
        })
    }
}
