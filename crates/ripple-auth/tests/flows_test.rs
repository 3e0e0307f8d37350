//! Integration tests for the invite, magic link and referral flows.

mod common;

use chrono::{Duration, Utc};
use common::{APP, Harness, REFERRAL_BASE, link_param};
use ripple_auth::email::MemoryEmailSender;
use ripple_auth::invite::{AcceptInvite, CreateInviteInput};
use ripple_auth::magic_link::MagicLinkRequest;
use ripple_auth::referral::{ReferralRedirect, ReferralSignup};
use ripple_auth::{Credential, IdentitySource, token};
use ripple_core::error::RippleError;
use ripple_core::models::identity::Identity;
use ripple_core::models::invite::CreateInviteToken;
use ripple_core::models::magic_link::MagicLinkIntent;
use ripple_core::models::role::Role;
use ripple_core::repository::{InviteRepository, UserRepository};
use ripple_db::repository::SurrealInviteRepository;

fn accept(username: &str) -> AcceptInvite {
    AcceptInvite {
        external_identity_id: format!("ext-{username}"),
        username: username.into(),
        display_name: None,
    }
}

fn customer_invite(email: &str) -> CreateInviteInput {
    CreateInviteInput {
        email: email.into(),
        role: Role::Customer,
        team_id: None,
    }
}

// -----------------------------------------------------------------------
// Invites
// -----------------------------------------------------------------------

#[tokio::test]
async fn invite_is_issued_accepted_once_and_then_gone() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let invites = h.invites();

    let before = Utc::now();
    let issued = invites
        .create(&admin, customer_invite("New.User@Example.com"))
        .await
        .unwrap();
    assert!(issued.delivered);
    assert!(!issued.invite.used);
    assert_eq!(issued.invite.email, "new.user@example.com");
    assert_eq!(issued.invite.role, Role::Customer);
    assert_eq!(issued.invite.tenant_id, acme.id);
    assert_eq!(issued.invite.token_hash, token::hash_token(&issued.token));
    let lifetime = issued.invite.expires_at - before;
    assert!(lifetime > Duration::days(7) - Duration::minutes(1));
    assert!(lifetime <= Duration::days(7) + Duration::minutes(1));
    assert_eq!(issued.accept_url, format!("{APP}/invite/{}", issued.token));

    let mail = h.email.last_to("new.user@example.com").unwrap();
    assert!(mail.subject.contains(&acme.name));
    assert!(mail.html_body.contains(&issued.token));

    let report = invites.validate(&issued.token).await;
    assert!(report.is_valid);
    assert!(!report.is_expired);
    assert!(!report.is_used);
    assert_eq!(report.tenant.as_ref().map(|t| t.id), Some(acme.id));
    assert_eq!(report.invited_by_name.as_deref(), Some("acme-admin"));
    assert_eq!(report.role, Some(Role::Customer));

    let user = invites.consume(&issued.token, accept("newbie")).await.unwrap();
    assert_eq!(user.tenant_id, acme.id);
    assert_eq!(user.role, Role::Customer);
    assert_eq!(user.email, "new.user@example.com");
    assert!(user.invite_verified);
    assert!(user.lineage_path.is_empty());

    let report = invites.validate(&issued.token).await;
    assert!(!report.is_valid);
    assert!(report.is_used);
    assert!(report.reason.is_some());

    let again = invites.consume(&issued.token, accept("newbie2")).await;
    assert!(matches!(again, Err(RippleError::Gone { .. })));
}

#[tokio::test]
async fn unknown_invite_reports_invalid() {
    let h = Harness::new().await;
    let invites = h.invites();

    let report = invites.validate("no-such-token").await;
    assert!(!report.is_valid);
    assert!(report.tenant.is_none());
    assert!(report.reason.is_some());

    let consumed = invites.consume("no-such-token", accept("nobody")).await;
    assert!(matches!(consumed, Err(RippleError::NotFound { .. })));
}

#[tokio::test]
async fn expired_invite_is_gone() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user(&acme, "acme-admin", Role::Admin).await;

    let raw = token::generate_token();
    SurrealInviteRepository::new(h.db.clone())
        .create(CreateInviteToken {
            token_hash: token::hash_token(&raw),
            email: "late@example.com".into(),
            role: Role::Customer,
            inviter_id: admin.id,
            tenant_id: acme.id,
            team_id: None,
            expires_at: Utc::now() - Duration::hours(1),
        })
        .await
        .unwrap();

    let invites = h.invites();
    let report = invites.validate(&raw).await;
    assert!(!report.is_valid);
    assert!(report.is_expired);
    assert!(!report.is_used);

    let consumed = invites.consume(&raw, accept("latecomer")).await;
    assert!(matches!(consumed, Err(RippleError::Gone { .. })));
}

#[tokio::test]
async fn concurrent_acceptance_has_one_winner() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let invites = h.invites();
    let issued = invites
        .create(&admin, customer_invite("race@example.com"))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        invites.consume(&issued.token, accept("racer-a")),
        invites.consume(&issued.token, accept("racer-b")),
    );
    let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(RippleError::Gone { .. })));
}

#[tokio::test]
async fn invite_rules() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let sales = h.user_identity(&acme, "sam", Role::SalesPerson).await;
    let invites = h.invites();

    let by_sales = invites.create(&sales, customer_invite("x@example.com")).await;
    assert!(matches!(by_sales, Err(RippleError::Forbidden { .. })));

    let super_invite = invites
        .create(
            &admin,
            CreateInviteInput {
                email: "boss@example.com".into(),
                role: Role::SuperAdmin,
                team_id: None,
            },
        )
        .await;
    assert!(matches!(super_invite, Err(RippleError::Forbidden { .. })));

    let bad_email = invites.create(&admin, customer_invite("not-an-email")).await;
    assert!(matches!(bad_email, Err(RippleError::Validation { .. })));

    // Already a member of the tenant.
    let existing = invites.create(&admin, customer_invite("sam@acme.test")).await;
    assert!(matches!(existing, Err(RippleError::Conflict { .. })));
}

#[tokio::test]
async fn suspended_tenant_blocks_invites() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let invites = h.invites();
    let issued = invites
        .create(&admin, customer_invite("pending@example.com"))
        .await
        .unwrap();

    h.suspend(&acme).await;

    let report = invites.validate(&issued.token).await;
    assert!(!report.is_valid);
    assert!(!report.is_used);

    let consumed = invites.consume(&issued.token, accept("pending")).await;
    assert!(matches!(consumed, Err(RippleError::TenantSuspended)));

    let created = invites.create(&admin, customer_invite("more@example.com")).await;
    assert!(matches!(created, Err(RippleError::TenantSuspended)));
}

#[tokio::test]
async fn undelivered_invite_is_still_usable() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let admin = h.user_identity(&acme, "acme-admin", Role::Admin).await;
    let invites = h.invites_with(MemoryEmailSender::failing());

    let issued = invites
        .create(&admin, customer_invite("offline@example.com"))
        .await
        .unwrap();
    assert!(!issued.delivered);
    assert!(invites.validate(&issued.token).await.is_valid);
}

// -----------------------------------------------------------------------
// Magic links
// -----------------------------------------------------------------------

fn sign_in(email: &str) -> MagicLinkRequest {
    MagicLinkRequest {
        email: email.into(),
        tenant_slug: "acme".into(),
        intent: MagicLinkIntent::SignIn,
        redirect_to: Some("/dashboard".into()),
    }
}

#[tokio::test]
async fn magic_link_signs_in_exactly_once() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let alice = h.user(&acme, "alice", Role::Customer).await;
    let links = h.magic_links();

    let before = Utc::now();
    let dispatch = links.send(sign_in("Alice@ACME.test")).await.unwrap();
    assert!(dispatch.delivered);
    assert!(dispatch.expires_at - before <= Duration::minutes(15) + Duration::seconds(5));

    let mail = h.email.last_to("alice@acme.test").unwrap();
    let raw = link_param(&mail.html_body, "token").unwrap();
    let email = link_param(&mail.html_body, "email").unwrap();
    assert_eq!(email, "alice@acme.test");

    let verified = links.verify(&raw, &email).await.unwrap();
    assert_eq!(verified.tenant_id, acme.id);
    assert_eq!(verified.intent, MagicLinkIntent::SignIn);
    assert_eq!(verified.redirect_to.as_deref(), Some("/dashboard"));
    assert_eq!(verified.user.as_ref().map(|u| u.id), Some(alice.id));

    let session = verified.session_token.unwrap();
    let identity = h
        .resolver()
        .resolve(&Credential::SessionToken(session))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.user_id, alice.id);

    let replay = links.verify(&raw, &email).await;
    assert!(matches!(replay, Err(RippleError::Gone { .. })));
}

#[tokio::test]
async fn concurrent_magic_link_verify_has_one_winner() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let alice = h.user(&acme, "alice", Role::Customer).await;

    h.magic_links().send(sign_in("alice@acme.test")).await.unwrap();
    let mail = h.email.last_to("alice@acme.test").unwrap();
    let raw = link_param(&mail.html_body, "token").unwrap();

    let (first, second) = (h.magic_links(), h.magic_links());
    let (a, b) = tokio::join!(
        first.verify(&raw, "alice@acme.test"),
        second.verify(&raw, "alice@acme.test"),
    );

    let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1);
    let (winner, loser) = if a.is_ok() { (a, b) } else { (b, a) };
    assert!(matches!(loser, Err(RippleError::Gone { .. })));
    let winner = winner.unwrap();
    assert_eq!(winner.user.map(|u| u.id), Some(alice.id));
    assert!(winner.session_token.is_some());
}

#[tokio::test]
async fn magic_link_requires_matching_email() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    h.user(&acme, "alice", Role::Customer).await;
    let links = h.magic_links();

    links.send(sign_in("alice@acme.test")).await.unwrap();
    let mail = h.email.last_to("alice@acme.test").unwrap();
    let raw = link_param(&mail.html_body, "token").unwrap();

    let wrong = links.verify(&raw, "mallory@acme.test").await;
    assert!(matches!(wrong, Err(RippleError::Gone { .. })));
}

#[tokio::test]
async fn sign_in_for_unknown_email_sends_nothing() {
    let h = Harness::new().await;
    h.tenant("acme").await;

    let dispatch = h
        .magic_links()
        .send(sign_in("ghost@example.com"))
        .await
        .unwrap();
    assert!(!dispatch.delivered);
    assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn sign_up_link_verifies_without_session() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let links = h.magic_links();

    links
        .send(MagicLinkRequest {
            email: "fresh@example.com".into(),
            tenant_slug: "acme".into(),
            intent: MagicLinkIntent::SignUp,
            redirect_to: None,
        })
        .await
        .unwrap();
    let mail = h.email.last_to("fresh@example.com").unwrap();
    let raw = link_param(&mail.html_body, "token").unwrap();

    let verified = links.verify(&raw, "fresh@example.com").await.unwrap();
    assert_eq!(verified.tenant_id, acme.id);
    assert!(verified.user.is_none());
    assert!(verified.session_token.is_none());
}

#[tokio::test]
async fn magic_link_rejects_offsite_redirects_and_suspended_tenants() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    h.user(&acme, "alice", Role::Customer).await;
    let links = h.magic_links();

    let offsite = links
        .send(MagicLinkRequest {
            redirect_to: Some("https://evil.example/".into()),
            ..sign_in("alice@acme.test")
        })
        .await;
    assert!(matches!(offsite, Err(RippleError::Validation { .. })));

    h.suspend(&acme).await;
    let suspended = links.send(sign_in("alice@acme.test")).await.unwrap();
    assert!(!suspended.delivered);
    assert!(h.email.sent().is_empty(), "no link is issued for a suspended tenant");
}

// -----------------------------------------------------------------------
// Referrals
// -----------------------------------------------------------------------

#[tokio::test]
async fn anonymous_visit_redirects_to_signup() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    h.user(&acme, "bob", Role::SalesPerson).await;

    let redirect = h.referrals().visit("bob", None).await;
    assert_eq!(
        redirect,
        ReferralRedirect::Signup(format!(
            "{APP}/signup?ref=bob&target_role=CUSTOMER&referrer_role=SALES_PERSON"
        ))
    );
}

#[tokio::test]
async fn signed_in_visit_redirects_to_dashboard() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    h.user(&acme, "bob", Role::SalesPerson).await;
    let visitor = h.user_identity(&acme, "carol", Role::Customer).await;

    let redirect = h.referrals().visit("bob", Some(&visitor)).await;
    assert_eq!(
        redirect.url(),
        format!("{APP}/dashboard?ref=bob&referrer_role=SALES_PERSON")
    );
    assert!(matches!(redirect, ReferralRedirect::Dashboard(_)));
}

#[tokio::test]
async fn invalid_referrers_land_on_generic_error() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let globex = h.tenant("globex").await;
    h.user(&acme, "emp", Role::Employee).await;
    h.user(&globex, "gina", Role::Customer).await;
    h.suspend(&globex).await;
    let landing = ReferralRedirect::Landing(format!("{APP}/?error=invalid_referral"));
    let referrals = h.referrals();

    assert_eq!(referrals.visit("nonexistent", None).await, landing);
    assert_eq!(referrals.visit("emp", None).await, landing);
    assert_eq!(referrals.visit("gina", None).await, landing);
}

#[tokio::test]
async fn referral_link_for_eligible_roles() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let bob = h.user_identity(&acme, "bob", Role::SalesPerson).await;
    let emp = h.user_identity(&acme, "emp", Role::Employee).await;
    let referrals = h.referrals();

    let link = referrals.link_for(&bob).await.unwrap();
    assert_eq!(link.username, "bob");
    assert_eq!(link.url, format!("{REFERRAL_BASE}/bob"));

    let denied = referrals.link_for(&emp).await;
    assert!(matches!(denied, Err(RippleError::Forbidden { .. })));

    h.suspend(&acme).await;
    let suspended = referrals.link_for(&bob).await;
    assert!(matches!(suspended, Err(RippleError::TenantSuspended)));
}

fn referred(referrer: &str, username: &str) -> ReferralSignup {
    ReferralSignup {
        referrer_username: referrer.into(),
        email: format!("{username}@example.com"),
        username: username.into(),
        external_identity_id: format!("ext-{username}"),
        display_name: None,
    }
}

#[tokio::test]
async fn referral_chain_builds_lineage_and_downline() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let a = h.user(&acme, "anna", Role::Customer).await;
    let referrals = h.referrals();

    let b = referrals.complete_signup(referred("anna", "bert")).await.unwrap();
    assert_eq!(b.tenant_id, acme.id);
    assert_eq!(b.role, Role::Customer);
    assert_eq!(b.lineage_path, vec![a.id]);

    let c = referrals.complete_signup(referred("bert", "cleo")).await.unwrap();
    assert_eq!(c.lineage_path, vec![a.id, b.id]);

    let downline = referrals.downline(&Identity::from(&a)).await.unwrap();
    let tiers: Vec<_> = downline
        .iter()
        .map(|e| (e.user.username.as_str(), e.tier))
        .collect();
    assert_eq!(tiers, vec![("bert", 1), ("cleo", 2)]);

    let made = referrals.referrals_made(&Identity::from(&a)).await.unwrap();
    assert_eq!(made.len(), 1);
    assert_eq!(made[0].referee_id, b.id);

    let from_b = referrals.downline(&Identity::from(&b)).await.unwrap();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].tier, 1);
}

#[tokio::test]
async fn self_referral_is_rejected() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    h.user(&acme, "anna", Role::Customer).await;

    let result = h
        .referrals()
        .complete_signup(ReferralSignup {
            referrer_username: "anna".into(),
            email: "anna@acme.test".into(),
            username: "anna-two".into(),
            external_identity_id: "ext-other".into(),
            display_name: None,
        })
        .await;
    assert!(matches!(result, Err(RippleError::Validation { .. })));
}

#[tokio::test]
async fn failed_referral_signup_leaves_nothing_behind() {
    let h = Harness::new().await;
    let acme = h.tenant("acme").await;
    let anna = h.user(&acme, "anna", Role::Customer).await;
    h.user(&acme, "taken", Role::Customer).await;
    let referrals = h.referrals();

    let duplicate = referrals.complete_signup(referred("anna", "taken")).await;
    assert!(matches!(duplicate, Err(RippleError::Conflict { .. })));
    assert!(
        referrals
            .referrals_made(&Identity::from(&anna))
            .await
            .unwrap()
            .is_empty()
    );
    let lookup = h.users().get_by_email(acme.id, "taken@example.com").await;
    assert!(matches!(lookup, Err(RippleError::NotFound { .. })));

    let unknown = referrals.complete_signup(referred("nobody", "orphan")).await;
    assert!(matches!(unknown, Err(RippleError::NotFound { .. })));
}
