//! Credential and session resolution.
//!
//! A request carries at most one [`Credential`]. Each [`IdentitySource`]
//! turns the credentials it understands into an [`Identity`] and answers
//! `Ok(None)` for everything else; being unauthenticated is never an
//! error. Only store failures surface.

use chrono::Utc;
use ripple_core::error::{RippleError, RippleResult};
use ripple_core::models::identity::Identity;
use ripple_core::models::session::{CreateSession, Session};
use ripple_core::models::user::UserProfile;
use ripple_core::repository::{SessionRepository, UserRepository};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::token;

/// Name of the cookie carrying the opaque session token.
pub const SESSION_COOKIE: &str = "ripple_session";
/// Name of the cookie carrying a signed development session.
pub const DEV_SESSION_COOKIE: &str = "ripple_dev_session";

/// Request-scoped credential, extracted by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    SessionToken(String),
    DevSession(String),
    Anonymous,
}

pub trait IdentitySource: Send + Sync {
    fn resolve(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = RippleResult<Option<Identity>>> + Send;
}

/// Store failures surface as `Internal`; `NotFound` means "no identity".
fn absent_or_internal<T>(result: RippleResult<T>) -> RippleResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RippleError::NotFound { .. }) => Ok(None),
        Err(e) => Err(RippleError::Internal(e.to_string())),
    }
}

/// A freshly established session. `token` is shown to the client once.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

// ---------------------------------------------------------------------------
// Opaque session tokens
// ---------------------------------------------------------------------------

pub(crate) async fn create_session<S: SessionRepository>(
    session_repo: &S,
    config: &AuthConfig,
    user: &UserProfile,
    ip_address: Option<String>,
    user_agent: Option<String>,
) -> RippleResult<IssuedSession> {
    let raw = token::generate_token();
    let session = session_repo
        .create(CreateSession {
            tenant_id: user.tenant_id,
            user_id: user.id,
            token_hash: token::hash_token(&raw),
            ip_address,
            user_agent,
            expires_at: Utc::now() + config.session_ttl(),
        })
        .await?;

    debug!(
        session_id = %session.id,
        tenant_id = %user.tenant_id,
        user_id = %user.id,
        "session established"
    );
    Ok(IssuedSession {
        token: raw,
        session,
    })
}

/// Resolves opaque session tokens against the session store.
pub struct SessionIdentitySource<U: UserRepository, S: SessionRepository> {
    user_repo: U,
    session_repo: S,
    config: AuthConfig,
}

impl<U: UserRepository, S: SessionRepository> SessionIdentitySource<U, S> {
    pub fn new(user_repo: U, session_repo: S, config: AuthConfig) -> Self {
        Self {
            user_repo,
            session_repo,
            config,
        }
    }

    async fn lookup(&self, raw: &str) -> RippleResult<Option<Identity>> {
        let token_hash = token::hash_token(raw);
        let Some(session) =
            absent_or_internal(self.session_repo.get_by_token_hash(&token_hash).await)?
        else {
            return Ok(None);
        };

        if session.expires_at <= Utc::now() {
            debug!(session_id = %session.id, "session expired");
            return Ok(None);
        }

        let user = absent_or_internal(
            self.user_repo
                .get_by_id(session.tenant_id, session.user_id)
                .await,
        )?;
        Ok(user.as_ref().map(Identity::from))
    }

    /// Issue a new session for `user`, storing only the token hash.
    pub async fn establish_session(
        &self,
        user: &UserProfile,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> RippleResult<IssuedSession> {
        create_session(&self.session_repo, &self.config, user, ip_address, user_agent).await
    }

    pub async fn end_session(&self, tenant_id: Uuid, session_id: Uuid) -> RippleResult<()> {
        self.session_repo.invalidate(tenant_id, session_id).await
    }

    /// Sign the user out everywhere.
    pub async fn end_all_sessions(&self, tenant_id: Uuid, user_id: Uuid) -> RippleResult<()> {
        self.session_repo
            .invalidate_user_sessions(tenant_id, user_id)
            .await?;
        debug!(tenant_id = %tenant_id, user_id = %user_id, "all sessions ended");
        Ok(())
    }
}

impl<U: UserRepository, S: SessionRepository> IdentitySource for SessionIdentitySource<U, S> {
    async fn resolve(&self, credential: &Credential) -> RippleResult<Option<Identity>> {
        match credential {
            Credential::SessionToken(raw) => self.lookup(raw).await,
            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Development bypass
// ---------------------------------------------------------------------------

/// Accepts HS256-signed development cookies, but only when dev mode was
/// enabled in configuration. Otherwise it resolves nothing.
#[derive(Debug, Clone)]
pub struct DevBypassSource {
    enabled: bool,
    secret: String,
}

impl DevBypassSource {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            enabled: config.dev_mode,
            secret: config.dev_session_secret.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn verify(&self, cookie: &str) -> Option<Identity> {
        let claims = match token::decode_dev_session(cookie, &self.secret) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "rejected dev session cookie");
                return None;
            }
        };
        match claims.into_identity() {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "malformed dev session claims");
                None
            }
        }
    }
}

impl IdentitySource for DevBypassSource {
    async fn resolve(&self, credential: &Credential) -> RippleResult<Option<Identity>> {
        match credential {
            Credential::DevSession(cookie) if self.enabled => Ok(self.verify(cookie)),
            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Dispatches a credential to the source that understands it.
pub struct CredentialResolver<U: UserRepository, S: SessionRepository> {
    sessions: SessionIdentitySource<U, S>,
    dev: DevBypassSource,
}

impl<U: UserRepository, S: SessionRepository> CredentialResolver<U, S> {
    pub fn new(sessions: SessionIdentitySource<U, S>, dev: DevBypassSource) -> Self {
        Self { sessions, dev }
    }

    pub fn sessions(&self) -> &SessionIdentitySource<U, S> {
        &self.sessions
    }
}

impl<U: UserRepository, S: SessionRepository> IdentitySource for CredentialResolver<U, S> {
    async fn resolve(&self, credential: &Credential) -> RippleResult<Option<Identity>> {
        match credential {
            Credential::SessionToken(_) => self.sessions.resolve(credential).await,
            Credential::DevSession(_) => self.dev.resolve(credential).await,
            Credential::Anonymous => Ok(None),
        }
    }
}
