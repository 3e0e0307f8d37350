//! Integration tests for credential resolution, tenant resolution and the
//! access validator, backed by in-memory SurrealDB.

mod common;

use chrono::{Duration, Utc};
use common::Harness;
use ripple_auth::invite::CreateInviteInput;
use ripple_auth::token;
use ripple_auth::{
    AccessDecision, AuthConfig, Credential, DenyReason, IdentitySource, TenantLookup,
};
use ripple_core::error::RippleError;
use ripple_core::models::identity::Identity;
use ripple_core::models::permission::{Action, Module, PermissionKey, Polarity, SetPermissionOverride};
use ripple_core::models::role::Role;
use ripple_core::models::session::CreateSession;
use ripple_core::models::tenant::{CreateTenant, TenantStatus, UpdateTenant};
use ripple_core::repository::{Pagination, SessionRepository};

// -----------------------------------------------------------------------
// Credential resolution
// -----------------------------------------------------------------------

#[tokio::test]
async fn session_token_resolves_to_profile_identity() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let alice = h.user(&acme, "alice", Role::SalesPerson).await;

    let resolver = h.resolver();
    let issued = resolver
        .sessions()
        .establish_session(&alice, Some("10.0.0.1".into()), None)
        .await
        .unwrap();

    let identity = resolver
        .resolve(&Credential::SessionToken(issued.token.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.user_id, alice.id);
    assert_eq!(identity.tenant_id, acme.id);
    assert_eq!(identity.role, Role::SalesPerson);
    assert_eq!(identity.email, "alice@acme.test");

    // Only the hash is stored.
    assert_ne!(issued.session.token_hash, issued.token);
    assert_eq!(issued.session.token_hash, token::hash_token(&issued.token));

    resolver
        .sessions()
        .end_session(acme.id, issued.session.id)
        .await
        .unwrap();
    let after = resolver
        .resolve(&Credential::SessionToken(issued.token))
        .await
        .unwrap();
    assert!(after.is_none());
}

#[tokio::test]
async fn unknown_and_missing_credentials_are_anonymous() {
    let h = Harness::new().await;
    let resolver = h.resolver();

    let unknown = resolver
        .resolve(&Credential::SessionToken("not-a-real-token".into()))
        .await
        .unwrap();
    assert!(unknown.is_none());

    let anonymous = resolver.resolve(&Credential::Anonymous).await.unwrap();
    assert!(anonymous.is_none());
}

#[tokio::test]
async fn expired_session_does_not_resolve() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let alice = h.user(&acme, "alice", Role::Customer).await;

    let raw = token::generate_token();
    h.sessions()
        .create(CreateSession {
            tenant_id: acme.id,
            user_id: alice.id,
            token_hash: token::hash_token(&raw),
            ip_address: None,
            user_agent: None,
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

    let resolved = h
        .resolver()
        .resolve(&Credential::SessionToken(raw))
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn dev_session_only_resolves_in_dev_mode() {
    let identity = Identity {
        user_id: uuid::Uuid::new_v4(),
        email: "dev@acme.test".into(),
        role: Role::Admin,
        tenant_id: uuid::Uuid::new_v4(),
        team_id: None,
    };

    let production = Harness::new().await;
    let cookie = token::issue_dev_session(
        &identity,
        &production.config.dev_session_secret,
        Duration::hours(1),
    )
    .unwrap();
    let resolved = production
        .resolver()
        .resolve(&Credential::DevSession(cookie.clone()))
        .await
        .unwrap();
    assert!(resolved.is_none());

    let dev = Harness::with_config(AuthConfig {
        dev_mode: true,
        ..production.config.clone()
    })
    .await;
    let resolved = dev
        .resolver()
        .resolve(&Credential::DevSession(cookie))
        .await
        .unwrap();
    assert_eq!(resolved, Some(identity));
}

// -----------------------------------------------------------------------
// Tenant resolution
// -----------------------------------------------------------------------

#[tokio::test]
async fn resolve_tenant_by_slug_and_domain() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let resolver = h.tenant_resolver();

    let by_slug = resolver.resolve("ACME", TenantLookup::Slug).await.unwrap();
    assert_eq!(by_slug.id, acme.id);

    let by_domain = resolver
        .resolve("https://acme.ripple.test/login", TenantLookup::Domain)
        .await
        .unwrap();
    assert_eq!(by_domain.id, acme.id);

    let missing = resolver.resolve("globex", TenantLookup::Slug).await;
    assert!(matches!(missing, Err(RippleError::NotFound { .. })));

    let empty = resolver.resolve("  ", TenantLookup::Slug).await;
    assert!(matches!(empty, Err(RippleError::Validation { .. })));
}

#[tokio::test]
async fn tenant_membership_requires_profile_and_active_tenant() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let globex = h.tenant("globex").await;
    let alice = h.user(&acme, "alice", Role::Customer).await;
    let resolver = h.tenant_resolver();

    assert!(resolver.validate_user_tenant_access(alice.id, acme.id).await.unwrap());
    assert!(!resolver.validate_user_tenant_access(alice.id, globex.id).await.unwrap());
    assert!(
        !resolver
            .validate_user_tenant_access(alice.id, uuid::Uuid::new_v4())
            .await
            .unwrap()
    );

    h.suspend(&acme).await;
    assert!(!resolver.validate_user_tenant_access(alice.id, acme.id).await.unwrap());
}

// -----------------------------------------------------------------------
// Access validation
// -----------------------------------------------------------------------

#[tokio::test]
async fn anonymous_requests_are_unauthenticated() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;

    let decision = h.access().authorize(None, acme.id, None).await.unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::Unauthenticated));

    let required = h.access().require(None, acme.id, None).await;
    assert!(matches!(required, Err(RippleError::Unauthenticated)));
}

#[tokio::test]
async fn cross_tenant_access_is_denied() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let globex = h.tenant("globex").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let access = h.access();

    let decision = access.authorize(Some(&admin), globex.id, None).await.unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::CrossTenant));

    // An unknown tenant looks the same as somebody else's.
    let decision = access
        .authorize(Some(&admin), uuid::Uuid::new_v4(), None)
        .await
        .unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::CrossTenant));

    let decision = access.authorize(Some(&admin), acme.id, None).await.unwrap();
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn super_admin_crosses_tenants() {
    let h = Harness::new().await;
    let system = h.tenant("system").await;
    let acme = h.tenant("acme").await;
    let root = h.user_identity(&system, "root", Role::SuperAdmin).await;

    let decision = h
        .access()
        .authorize(Some(&root), acme.id, Some((Module::Billing, Action::Manage)))
        .await
        .unwrap();
    assert_eq!(decision, AccessDecision::Allow);
}

#[tokio::test]
async fn suspended_tenant_blocks_its_members() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let alice = h.user_identity(&acme, "alice", Role::Customer).await;
    h.suspend(&acme).await;

    let decision = h.access().authorize(Some(&alice), acme.id, None).await.unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::TenantSuspended));

    let required = h.access().require(Some(&alice), acme.id, None).await;
    assert!(matches!(required, Err(RippleError::TenantSuspended)));
}

#[tokio::test]
async fn role_defaults_gate_permissions() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let alice = h.user_identity(&acme, "alice", Role::Customer).await;
    let access = h.access();

    let decision = access
        .authorize(Some(&alice), acme.id, Some((Module::Dashboard, Action::View)))
        .await
        .unwrap();
    assert!(decision.is_allowed());

    let decision = access
        .authorize(Some(&alice), acme.id, Some((Module::Settings, Action::View)))
        .await
        .unwrap();
    assert_eq!(
        decision,
        AccessDecision::Deny(DenyReason::InsufficientPermission)
    );
    assert!(matches!(
        decision.into_result(),
        Err(RippleError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn denial_beats_role_default_and_grants_extend_it() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let other_admin = h.user_identity(&acme, "second-admin", Role::Admin).await;
    let alice = h.user_identity(&acme, "alice", Role::Customer).await;
    let engine = h.permissions();

    engine
        .set_override(
            &admin,
            SetPermissionOverride {
                tenant_id: acme.id,
                user_id: other_admin.user_id,
                team_id: None,
                module: Module::Settings,
                action: Action::Edit,
                polarity: Polarity::Denied,
            },
        )
        .await
        .unwrap();
    engine
        .set_override(
            &admin,
            SetPermissionOverride {
                tenant_id: acme.id,
                user_id: alice.user_id,
                team_id: None,
                module: Module::Reports,
                action: Action::View,
                polarity: Polarity::Granted,
            },
        )
        .await
        .unwrap();

    let access = h.access();
    let decision = access
        .authorize(Some(&other_admin), acme.id, Some((Module::Settings, Action::Edit)))
        .await
        .unwrap();
    assert_eq!(
        decision,
        AccessDecision::Deny(DenyReason::InsufficientPermission)
    );

    let decision = access
        .authorize(Some(&alice), acme.id, Some((Module::Reports, Action::View)))
        .await
        .unwrap();
    assert!(decision.is_allowed());

    let effective = engine.evaluate(acme.id, other_admin.user_id, None).await.unwrap();
    assert!(effective.denied_permissions.contains(&PermissionKey::new(Module::Settings, Action::Edit)));
    assert!(!effective.allowed().contains(&PermissionKey::new(Module::Settings, Action::Edit)));

    // Clearing the denial restores the default.
    engine
        .clear_override(
            &admin,
            acme.id,
            other_admin.user_id,
            None,
            PermissionKey::new(Module::Settings, Action::Edit),
        )
        .await
        .unwrap();
    let decision = access
        .authorize(Some(&other_admin), acme.id, Some((Module::Settings, Action::Edit)))
        .await
        .unwrap();
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn only_tenant_admins_manage_overrides() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let globex = h.tenant("globex").await;
    let employee = h.user_identity(&acme, "emp", Role::Employee).await;
    let foreign_admin = h.user_identity(&globex, "globex-admin", Role::Admin).await;
    let alice = h.user_identity(&acme, "alice", Role::Customer).await;

    let input = SetPermissionOverride {
        tenant_id: acme.id,
        user_id: alice.user_id,
        team_id: None,
        module: Module::Reports,
        action: Action::View,
        polarity: Polarity::Granted,
    };
    let by_employee = h.permissions().set_override(&employee, input.clone()).await;
    assert!(matches!(by_employee, Err(RippleError::Forbidden { .. })));

    let by_foreign = h.permissions().set_override(&foreign_admin, input).await;
    assert!(matches!(by_foreign, Err(RippleError::Forbidden { .. })));
}

// -----------------------------------------------------------------------
// Role administration and impersonation
// -----------------------------------------------------------------------

#[tokio::test]
async fn impersonation_targets_exclude_super_admins() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let employee = h.user_identity(&acme, "emp", Role::Employee).await;
    h.user(&acme, "alice", Role::Customer).await;
    h.user(&acme, "hidden-root", Role::SuperAdmin).await;

    let targets = h
        .access()
        .list_impersonation_targets(&admin, acme.id)
        .await
        .unwrap();
    let mut names: Vec<_> = targets.iter().map(|u| u.username.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["acme-admin", "alice", "emp"]);

    let denied = h.access().list_impersonation_targets(&employee, acme.id).await;
    assert!(matches!(denied, Err(RippleError::Forbidden { .. })));
}

#[tokio::test]
async fn admin_changes_roles_within_limits() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let globex = h.tenant("globex").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let peer = h.user(&acme, "second-admin", Role::Admin).await;
    let alice = h.user(&acme, "alice", Role::Customer).await;
    let foreign_admin = h.user_identity(&globex, "globex-admin", Role::Admin).await;
    let access = h.access();

    let promoted = access
        .change_role(&admin, acme.id, alice.id, Role::SalesPerson)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::SalesPerson);

    let to_super = access
        .change_role(&admin, acme.id, alice.id, Role::SuperAdmin)
        .await;
    assert!(matches!(to_super, Err(RippleError::Forbidden { .. })));

    let on_peer = access
        .change_role(&admin, acme.id, peer.id, Role::Customer)
        .await;
    assert!(matches!(on_peer, Err(RippleError::Forbidden { .. })));

    let on_self = access
        .change_role(&admin, acme.id, admin.user_id, Role::Customer)
        .await;
    assert!(matches!(on_self, Err(RippleError::Forbidden { .. })));

    let cross = access
        .change_role(&foreign_admin, acme.id, alice.id, Role::Customer)
        .await;
    assert!(matches!(cross, Err(RippleError::CrossTenant)));

    let by_customer = access
        .change_role(&Identity::from(&alice), acme.id, peer.id, Role::Customer)
        .await;
    assert!(matches!(by_customer, Err(RippleError::Forbidden { .. })));
}

#[tokio::test]
async fn denied_overrides_gate_administrative_operations() {
    let h = Harness::new().await;
    let system = h.tenant("system").await;
    let acme = h.tenant("acme").await;
    let root = h.user_identity(&system, "root", Role::SuperAdmin).await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let alice = h.user(&acme, "alice", Role::Customer).await;

    let permissions = h.permissions();
    for (module, action) in [
        (Module::Invitations, Action::Create),
        (Module::Invitations, Action::View),
        (Module::Settings, Action::Edit),
        (Module::UserManagement, Action::View),
        (Module::UserManagement, Action::Manage),
    ] {
        permissions
            .set_override(
                &root,
                SetPermissionOverride {
                    tenant_id: acme.id,
                    user_id: admin.user_id,
                    team_id: None,
                    module,
                    action,
                    polarity: Polarity::Denied,
                },
            )
            .await
            .unwrap();
    }

    let invite = h
        .invites()
        .create(
            &admin,
            CreateInviteInput {
                email: "new@example.com".into(),
                role: Role::Customer,
                team_id: None,
            },
        )
        .await;
    assert!(matches!(invite, Err(RippleError::Forbidden { .. })), "got {invite:?}");
    assert!(h.email.sent().is_empty());

    let listed = h.invites().list(&admin, Pagination::default()).await;
    assert!(matches!(listed, Err(RippleError::Forbidden { .. })));

    let settings = h
        .tenant_admin()
        .update_settings(
            &admin,
            acme.id,
            UpdateTenant {
                name: Some("Renamed".into()),
                ..UpdateTenant::default()
            },
        )
        .await;
    assert!(matches!(settings, Err(RippleError::Forbidden { .. })));

    let targets = h.access().list_impersonation_targets(&admin, acme.id).await;
    assert!(matches!(targets, Err(RippleError::Forbidden { .. })));

    let role = h
        .access()
        .change_role(&admin, acme.id, alice.id, Role::SalesPerson)
        .await;
    assert!(matches!(role, Err(RippleError::Forbidden { .. })));
    let unchanged = h
        .permissions()
        .evaluate(acme.id, alice.id, None)
        .await
        .unwrap();
    assert_eq!(unchanged.role, Role::Customer);

    // The super admin is unaffected by the acme admin's denials.
    let renamed = h
        .tenant_admin()
        .update_settings(
            &root,
            acme.id,
            UpdateTenant {
                name: Some("Acme Renamed".into()),
                ..UpdateTenant::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Acme Renamed");
}

#[tokio::test]
async fn suspended_tenant_settings_are_frozen() {
    let h = Harness::new().await;
    let system = h.tenant("system").await;
    let acme = h.tenant("acme").await;
    let root = h.user_identity(&system, "root", Role::SuperAdmin).await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    h.suspend(&acme).await;

    let rename = UpdateTenant {
        name: Some("Still Acme".into()),
        ..UpdateTenant::default()
    };
    let by_admin = h
        .tenant_admin()
        .update_settings(&admin, acme.id, rename.clone())
        .await;
    assert!(matches!(by_admin, Err(RippleError::TenantSuspended)));

    // Reactivation is still possible.
    let reactivated = h
        .tenant_admin()
        .set_status(&root, acme.id, TenantStatus::Active)
        .await
        .unwrap();
    assert_eq!(reactivated.status, TenantStatus::Active);
    let renamed = h
        .tenant_admin()
        .update_settings(&admin, acme.id, rename)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Still Acme");
}

// -----------------------------------------------------------------------
// Tenant administration
// -----------------------------------------------------------------------

#[tokio::test]
async fn tenant_provisioning_and_settings() {
    let h = Harness::new().await;
    let system = h.tenant("system").await;
    let root = h.user_identity(&system, "root", Role::SuperAdmin).await;
    let admin_svc = h.tenant_admin();

    let globex = admin_svc
        .provision(
            &root,
            CreateTenant {
                name: "Globex".into(),
                slug: "Globex".into(),
                domain: None,
                plan: Default::default(),
                branding: Default::default(),
            },
        )
        .await
        .unwrap();
    assert_eq!(globex.slug, "globex");
    assert_eq!(globex.status, TenantStatus::Active);

    let duplicate = admin_svc
        .provision(
            &root,
            CreateTenant {
                name: "Globex again".into(),
                slug: "globex".into(),
                domain: None,
                plan: Default::default(),
                branding: Default::default(),
            },
        )
        .await;
    assert!(matches!(duplicate, Err(RippleError::Conflict { .. })));

    let bad_slug = admin_svc
        .provision(
            &root,
            CreateTenant {
                name: "Bad".into(),
                slug: "-bad-".into(),
                domain: None,
                plan: Default::default(),
                branding: Default::default(),
            },
        )
        .await;
    assert!(matches!(bad_slug, Err(RippleError::Validation { .. })));

    let reserved = admin_svc
        .provision(
            &root,
            CreateTenant {
                name: "Shadow".into(),
                slug: "system".into(),
                domain: None,
                plan: Default::default(),
                branding: Default::default(),
            },
        )
        .await;
    assert!(matches!(reserved, Err(RippleError::Validation { .. })));

    let globex_admin = h.user_identity(&globex, "globex-admin", Role::Admin).await;
    let renamed = admin_svc
        .update_settings(
            &globex_admin,
            globex.id,
            UpdateTenant {
                name: Some("Globex Corp".into()),
                ..UpdateTenant::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Globex Corp");

    let not_super = admin_svc
        .provision(
            &globex_admin,
            CreateTenant {
                name: "Initech".into(),
                slug: "initech".into(),
                domain: None,
                plan: Default::default(),
                branding: Default::default(),
            },
        )
        .await;
    assert!(matches!(not_super, Err(RippleError::Forbidden { .. })));

    let acme = h.tenant("acme").await;
    let foreign = admin_svc
        .update_settings(&globex_admin, acme.id, UpdateTenant::default())
        .await;
    assert!(matches!(foreign, Err(RippleError::Forbidden { .. })));

    let suspended = admin_svc
        .set_status(&root, globex.id, TenantStatus::Suspended)
        .await
        .unwrap();
    assert_eq!(suspended.status, TenantStatus::Suspended);

    let by_admin = admin_svc
        .set_status(&globex_admin, globex.id, TenantStatus::Active)
        .await;
    assert!(matches!(by_admin, Err(RippleError::Forbidden { .. })));
}
