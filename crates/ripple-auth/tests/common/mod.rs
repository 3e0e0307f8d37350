//! Shared fixtures: an in-memory SurrealDB with migrations applied and
//! services wired to it.

#![allow(dead_code)]

use ripple_auth::email::MemoryEmailSender;
use ripple_auth::{
    AccessValidator, AuthConfig, CredentialResolver, DevBypassSource, InviteService,
    MagicLinkService, PermissionEngine, ReferralService, SessionIdentitySource, TenantAdmin,
    TenantResolver,
};
use ripple_core::models::identity::Identity;
use ripple_core::models::role::Role;
use ripple_core::models::tenant::{Branding, CreateTenant, Tenant, TenantPlan, TenantStatus};
use ripple_core::models::user::{CreateUserProfile, UserProfile};
use ripple_core::repository::{TenantRepository, UserRepository};
use ripple_db::repository::{
    SurrealInviteRepository, SurrealMagicLinkRepository, SurrealPermissionRepository,
    SurrealReferralRepository, SurrealSessionRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

pub const APP: &str = "https://app.ripple.test";
pub const REFERRAL_BASE: &str = "https://ripple.test/r";

pub type Tenants = SurrealTenantRepository<Db>;
pub type Users = SurrealUserRepository<Db>;
pub type Sessions = SurrealSessionRepository<Db>;
pub type Permissions = SurrealPermissionRepository<Db>;

pub struct Harness {
    pub db: Surreal<Db>,
    pub config: AuthConfig,
    pub email: MemoryEmailSender,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(AuthConfig {
            app_base_url: APP.into(),
            referral_base_url: REFERRAL_BASE.into(),
            dev_session_secret: "test-dev-secret".into(),
            ..AuthConfig::default()
        })
        .await
    }

    pub async fn with_config(config: AuthConfig) -> Self {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        ripple_db::run_migrations(&db).await.unwrap();
        Self {
            db,
            config,
            email: MemoryEmailSender::new(),
        }
    }

    pub fn tenants(&self) -> Tenants {
        SurrealTenantRepository::new(self.db.clone())
    }

    pub fn users(&self) -> Users {
        SurrealUserRepository::new(self.db.clone())
    }

    pub fn sessions(&self) -> Sessions {
        SurrealSessionRepository::new(self.db.clone())
    }

    pub fn permission_repo(&self) -> Permissions {
        SurrealPermissionRepository::new(self.db.clone())
    }

    // -- fixtures ----------------------------------------------------------

    pub async fn tenant(&self, slug: &str) -> Tenant {
        self.tenants()
            .create(CreateTenant {
                name: format!("{} Inc", slug.to_uppercase()),
                slug: slug.into(),
                domain: None,
                plan: TenantPlan::Free,
                branding: Branding::default(),
            })
            .await
            .unwrap()
    }

    pub async fn suspend(&self, tenant: &Tenant) {
        self.tenants()
            .set_status(tenant.id, TenantStatus::Suspended)
            .await
            .unwrap();
    }

    pub async fn user(&self, tenant: &Tenant, username: &str, role: Role) -> UserProfile {
        self.users()
            .create(CreateUserProfile {
                tenant_id: tenant.id,
                external_identity_id: format!("ext-{username}"),
                username: username.into(),
                email: format!("{username}@{}.test", tenant.slug),
                display_name: None,
                team_id: None,
                role,
                lineage_path: Vec::new(),
                invite_verified: true,
            })
            .await
            .unwrap()
    }

    pub async fn user_identity(&self, tenant: &Tenant, username: &str, role: Role) -> Identity {
        Identity::from(&self.user(tenant, username, role).await)
    }

    // -- services ----------------------------------------------------------

    pub fn session_source(&self) -> SessionIdentitySource<Users, Sessions> {
        SessionIdentitySource::new(self.users(), self.sessions(), self.config.clone())
    }

    pub fn resolver(&self) -> CredentialResolver<Users, Sessions> {
        CredentialResolver::new(self.session_source(), DevBypassSource::new(&self.config))
    }

    pub fn tenant_resolver(&self) -> TenantResolver<Tenants, Users> {
        TenantResolver::new(self.tenants(), self.users())
    }

    pub fn tenant_admin(&self) -> TenantAdmin<Tenants, Users, Permissions> {
        TenantAdmin::new(self.access())
    }

    pub fn permissions(&self) -> PermissionEngine<Users, Permissions> {
        PermissionEngine::new(self.users(), self.permission_repo())
    }

    pub fn access(&self) -> AccessValidator<Tenants, Users, Permissions> {
        AccessValidator::new(self.tenants(), self.permissions())
    }

    pub fn invites(
        &self,
    ) -> InviteService<Tenants, Users, Permissions, SurrealInviteRepository<Db>, MemoryEmailSender> {
        self.invites_with(self.email.clone())
    }

    pub fn invites_with(
        &self,
        email: MemoryEmailSender,
    ) -> InviteService<Tenants, Users, Permissions, SurrealInviteRepository<Db>, MemoryEmailSender> {
        InviteService::new(
            self.access(),
            SurrealInviteRepository::new(self.db.clone()),
            email,
            self.config.clone(),
        )
    }

    pub fn magic_links(
        &self,
    ) -> MagicLinkService<Tenants, Users, SurrealMagicLinkRepository<Db>, Sessions, MemoryEmailSender>
    {
        MagicLinkService::new(
            self.tenants(),
            self.users(),
            SurrealMagicLinkRepository::new(self.db.clone()),
            self.sessions(),
            self.email.clone(),
            self.config.clone(),
        )
    }

    pub fn referrals(&self) -> ReferralService<Tenants, Users, SurrealReferralRepository<Db>> {
        ReferralService::new(
            self.tenants(),
            self.users(),
            SurrealReferralRepository::new(self.db.clone()),
            self.config.clone(),
        )
    }
}

/// Pull a query parameter out of a link embedded in an HTML email body.
pub fn link_param(html: &str, name: &str) -> Option<String> {
    let start = html.find(&format!("{name}="))? + name.len() + 1;
    let rest = &html[start..];
    let end = rest.find(['&', '"']).unwrap_or(rest.len());
    Some(urlencoding::decode(&rest[..end]).ok()?.into_owned())
}
