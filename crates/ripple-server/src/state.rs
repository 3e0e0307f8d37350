//! Application state
//!
//! One set of services per process, shared by every request. Services hold
//! repository handles and immutable configuration only.

use std::sync::Arc;

use ripple_auth::email::{EmailError, EmailSender, LogEmailSender, MemoryEmailSender};
use ripple_auth::{
    AccessValidator, AuthConfig, CredentialResolver, DevBypassSource, InviteService,
    MagicLinkService, PermissionEngine, ReferralService, SessionIdentitySource, TenantAdmin,
    TenantResolver,
};
use ripple_db::repository::{
    SurrealInviteRepository, SurrealMagicLinkRepository, SurrealPermissionRepository,
    SurrealReferralRepository, SurrealSessionRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

pub type Tenants = SurrealTenantRepository<Any>;
pub type Users = SurrealUserRepository<Any>;
pub type Sessions = SurrealSessionRepository<Any>;
pub type Permissions = SurrealPermissionRepository<Any>;

/// Outbound email transport selected at startup.
#[derive(Debug, Clone)]
pub enum Mailer {
    Log(LogEmailSender),
    /// Keeps messages in memory; used by tests and local demos.
    Memory(MemoryEmailSender),
}

impl EmailSender for Mailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        match self {
            Self::Log(sender) => sender.send(to, subject, html_body).await,
            Self::Memory(sender) => sender.send(to, subject, html_body).await,
        }
    }
}

pub struct Services {
    pub config: AuthConfig,
    pub credentials: CredentialResolver<Users, Sessions>,
    pub tenants: TenantResolver<Tenants, Users>,
    pub tenant_admin: TenantAdmin<Tenants, Users, Permissions>,
    pub access: AccessValidator<Tenants, Users, Permissions>,
    pub invites: InviteService<Tenants, Users, Permissions, SurrealInviteRepository<Any>, Mailer>,
    pub magic_links:
        MagicLinkService<Tenants, Users, SurrealMagicLinkRepository<Any>, Sessions, Mailer>,
    pub referrals: ReferralService<Tenants, Users, SurrealReferralRepository<Any>>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Services>,
}

impl AppState {
    pub fn new(db: Surreal<Any>, config: AuthConfig, mailer: Mailer) -> Self {
        let tenants = || SurrealTenantRepository::new(db.clone());
        let users = || SurrealUserRepository::new(db.clone());
        let sessions = || SurrealSessionRepository::new(db.clone());

        let credentials = CredentialResolver::new(
            SessionIdentitySource::new(users(), sessions(), config.clone()),
            DevBypassSource::new(&config),
        );
        let access = || {
            AccessValidator::new(
                tenants(),
                PermissionEngine::new(users(), SurrealPermissionRepository::new(db.clone())),
            )
        };

        let services = Services {
            credentials,
            tenants: TenantResolver::new(tenants(), users()),
            tenant_admin: TenantAdmin::new(access()),
            access: access(),
            invites: InviteService::new(
                access(),
                SurrealInviteRepository::new(db.clone()),
                mailer.clone(),
                config.clone(),
            ),
            magic_links: MagicLinkService::new(
                tenants(),
                users(),
                SurrealMagicLinkRepository::new(db.clone()),
                sessions(),
                mailer,
                config.clone(),
            ),
            referrals: ReferralService::new(
                tenants(),
                users(),
                SurrealReferralRepository::new(db.clone()),
                config.clone(),
            ),
            config,
        };
        Self {
            inner: Arc::new(services),
        }
    }

    pub fn services(&self) -> &Services {
        &self.inner
    }

    pub fn permissions(&self) -> &PermissionEngine<Users, Permissions> {
        self.inner.access.permissions()
    }
}
