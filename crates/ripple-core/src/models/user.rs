//! User profile domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    /// Subject identifier issued by the external identity provider.
    pub external_identity_id: String,
    /// Public handle used in referral links. Unique across the platform,
    /// compared case-insensitively.
    pub username: String,
    /// Lower-cased; unique within the tenant.
    pub email: String,
    pub display_name: Option<String>,
    pub tenant_id: Uuid,
    pub team_id: Option<Uuid>,
    pub role: Role,
    pub referral_code: String,
    /// Ancestor referrer ids, root first. Empty for users who signed up
    /// without a referral.
    pub lineage_path: Vec<Uuid>,
    pub invite_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Name shown to other users (display name, falling back to username).
    pub fn public_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Lineage a user referred by `self` inherits.
    pub fn child_lineage(&self) -> Vec<Uuid> {
        let mut path = self.lineage_path.clone();
        path.push(self.id);
        path
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserProfile {
    pub tenant_id: Uuid,
    pub external_identity_id: String,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub team_id: Option<Uuid>,
    pub role: Role,
    #[serde(default)]
    pub lineage_path: Vec<Uuid>,
    #[serde(default)]
    pub invite_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUserProfile {
    pub display_name: Option<Option<String>>,
    pub team_id: Option<Option<Uuid>>,
    pub role: Option<Role>,
    pub invite_verified: Option<bool>,
}

/// Normalise an email address for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Usernames appear in URLs: 3-32 characters of `[A-Za-z0-9_.-]`.
pub fn is_valid_username(username: &str) -> bool {
    (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
