//! Integration tests for the tenant and user profile repositories using
//! in-memory SurrealDB.

use ripple_core::error::RippleError;
use ripple_core::models::role::Role;
use ripple_core::models::tenant::{Branding, CreateTenant, TenantPlan, TenantStatus, UpdateTenant};
use ripple_core::models::user::{CreateUserProfile, UpdateUserProfile};
use ripple_core::repository::{Pagination, TenantRepository, UserRepository};
use ripple_db::repository::{SurrealTenantRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    ripple_db::run_migrations(&db).await.unwrap();
    db
}

fn tenant_input(slug: &str) -> CreateTenant {
    CreateTenant {
        name: format!("{slug} Inc"),
        slug: slug.into(),
        domain: None,
        plan: TenantPlan::Free,
        branding: Branding::default(),
    }
}

fn profile_input(tenant_id: Uuid, username: &str) -> CreateUserProfile {
    CreateUserProfile {
        tenant_id,
        external_identity_id: format!("ext-{username}"),
        username: username.into(),
        email: format!("{username}@example.com"),
        display_name: None,
        team_id: None,
        role: Role::Customer,
        lineage_path: Vec::new(),
        invite_verified: false,
    }
}

// -----------------------------------------------------------------------
// Migrations
// -----------------------------------------------------------------------

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = setup().await;
    assert_eq!(ripple_db::schema_version(&db).await.unwrap(), 1);
    assert_eq!(ripple_db::run_migrations(&db).await.unwrap(), 0);
}

// -----------------------------------------------------------------------
// Tenants
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_get_tenant() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo.create(tenant_input("acme")).await.unwrap();
    assert_eq!(tenant.slug, "acme");
    assert_eq!(tenant.status, TenantStatus::Active);
    assert_eq!(tenant.plan, TenantPlan::Free);

    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert_eq!(fetched.id, tenant.id);

    let by_slug = repo.get_by_slug("acme").await.unwrap();
    assert_eq!(by_slug.id, tenant.id);
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let err = repo.get_by_slug("ghost").await.unwrap_err();
    assert!(matches!(err, RippleError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_tenant_slug_rejected() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    repo.create(tenant_input("dup")).await.unwrap();
    let err = repo.create(tenant_input("dup")).await.unwrap_err();
    assert!(matches!(err, RippleError::Conflict { .. }), "got {err:?}");
}

#[tokio::test]
async fn update_tenant_settings() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);
    let tenant = repo.create(tenant_input("upd")).await.unwrap();

    let updated = repo
        .update(
            tenant.id,
            UpdateTenant {
                name: Some("Renamed".into()),
                domain: Some(Some("upd.example.com".into())),
                plan: Some(TenantPlan::Pro),
                branding: Some(Branding {
                    primary_color: Some("#112233".into()),
                    ..Branding::default()
                }),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.slug, "upd");
    assert_eq!(updated.domain.as_deref(), Some("upd.example.com"));
    assert_eq!(updated.plan, TenantPlan::Pro);
    assert_eq!(updated.branding.primary_color.as_deref(), Some("#112233"));
    assert!(updated.updated_at >= tenant.updated_at);
}

#[tokio::test]
async fn suspend_and_reactivate_tenant() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);
    let tenant = repo.create(tenant_input("flip")).await.unwrap();

    let suspended = repo.set_status(tenant.id, TenantStatus::Suspended).await.unwrap();
    assert_eq!(suspended.status, TenantStatus::Suspended);

    let active = repo.set_status(tenant.id, TenantStatus::Active).await.unwrap();
    assert!(active.is_active());
}

#[tokio::test]
async fn list_tenants_with_pagination() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);
    for i in 0..5 {
        repo.create(tenant_input(&format!("t{i}"))).await.unwrap();
    }

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total, 5);
}

// -----------------------------------------------------------------------
// User profiles
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_lookup_profile() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let tenant = tenants.create(tenant_input("acme")).await.unwrap();

    let mut input = profile_input(tenant.id, "Alice");
    input.email = "Alice@Example.COM".into();
    let alice = users.create(input).await.unwrap();

    assert_eq!(alice.email, "alice@example.com");
    assert_eq!(alice.username, "Alice");
    assert!(!alice.referral_code.is_empty());
    assert!(alice.lineage_path.is_empty());

    let by_id = users.get_by_id(tenant.id, alice.id).await.unwrap();
    assert_eq!(by_id.id, alice.id);

    let by_email = users.get_by_email(tenant.id, "ALICE@example.com").await.unwrap();
    assert_eq!(by_email.id, alice.id);

    let by_username = users.get_by_username("alice").await.unwrap();
    assert_eq!(by_username.id, alice.id);
}

#[tokio::test]
async fn profile_lookup_is_tenant_scoped() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let acme = tenants.create(tenant_input("acme")).await.unwrap();
    let globex = tenants.create(tenant_input("globex")).await.unwrap();

    let alice = users.create(profile_input(acme.id, "alice")).await.unwrap();

    let err = users.get_by_id(globex.id, alice.id).await.unwrap_err();
    assert!(matches!(err, RippleError::NotFound { .. }));
}

#[tokio::test]
async fn usernames_are_globally_unique_ignoring_case() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let acme = tenants.create(tenant_input("acme")).await.unwrap();
    let globex = tenants.create(tenant_input("globex")).await.unwrap();

    users.create(profile_input(acme.id, "bob")).await.unwrap();

    let mut clash = profile_input(globex.id, "BOB");
    clash.email = "other@example.com".into();
    let err = users.create(clash).await.unwrap_err();
    assert!(matches!(err, RippleError::Conflict { .. }), "got {err:?}");
}

#[tokio::test]
async fn email_is_unique_within_tenant_only() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let acme = tenants.create(tenant_input("acme")).await.unwrap();
    let globex = tenants.create(tenant_input("globex")).await.unwrap();

    users.create(profile_input(acme.id, "carol")).await.unwrap();

    let mut same_tenant = profile_input(acme.id, "carol2");
    same_tenant.email = "carol@example.com".into();
    assert!(users.create(same_tenant).await.is_err());

    let mut other_tenant = profile_input(globex.id, "carol3");
    other_tenant.email = "carol@example.com".into();
    assert!(users.create(other_tenant).await.is_ok());
}

#[tokio::test]
async fn update_profile_role_and_team() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let tenant = tenants.create(tenant_input("acme")).await.unwrap();
    let dave = users.create(profile_input(tenant.id, "dave")).await.unwrap();
    let team = Uuid::new_v4();

    let updated = users
        .update(
            tenant.id,
            dave.id,
            UpdateUserProfile {
                role: Some(Role::SalesPerson),
                team_id: Some(Some(team)),
                ..UpdateUserProfile::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.role, Role::SalesPerson);
    assert_eq!(updated.team_id, Some(team));
}

#[tokio::test]
async fn descendants_follow_lineage() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let users = SurrealUserRepository::new(db);
    let tenant = tenants.create(tenant_input("acme")).await.unwrap();

    let a = users.create(profile_input(tenant.id, "aaa")).await.unwrap();
    let mut b_input = profile_input(tenant.id, "bbb");
    b_input.lineage_path = a.child_lineage();
    let b = users.create(b_input).await.unwrap();
    let mut c_input = profile_input(tenant.id, "ccc");
    c_input.lineage_path = b.child_lineage();
    let c = users.create(c_input).await.unwrap();

    assert_eq!(c.lineage_path, vec![a.id, b.id]);

    let under_a = users.list_descendants(tenant.id, a.id).await.unwrap();
    let ids: Vec<Uuid> = under_a.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![b.id, c.id]);

    let under_c = users.list_descendants(tenant.id, c.id).await.unwrap();
    assert!(under_c.is_empty());
}
