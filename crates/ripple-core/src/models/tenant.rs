//! Tenant domain model.
//!
//! Tenants provide full data isolation. Every user profile, invite,
//! referral and permission override is scoped to exactly one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slug of the reserved tenant that hosts platform super admins.
pub const SYSTEM_TENANT_SLUG: &str = "system";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TenantPlan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

/// Visual identity shown on tenant-branded pages and emails.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Branding {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

/// An isolated organizational account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique identifier (e.g., `acme`).
    pub slug: String,
    /// Optional custom domain.
    pub domain: Option<String>,
    pub status: TenantStatus,
    pub plan: TenantPlan,
    pub branding: Branding,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Fields required to provision a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    #[serde(default)]
    pub plan: TenantPlan,
    #[serde(default)]
    pub branding: Branding,
}

/// Settings that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub domain: Option<Option<String>>,
    pub plan: Option<TenantPlan>,
    pub branding: Option<Branding>,
}

/// Returns true if `slug` is usable as a tenant slug: 1-63 characters of
/// `[a-z0-9-]`, not starting or ending with `-`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
