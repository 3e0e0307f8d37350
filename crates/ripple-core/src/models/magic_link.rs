//! Magic link domain model (passwordless sign-in and sign-up).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagicLinkIntent {
    SignIn,
    SignUp,
}

impl MagicLinkIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignUp => "sign_up",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "sign_in" | "signin" | "login" => Some(Self::SignIn),
            "sign_up" | "signup" | "register" => Some(Self::SignUp),
            _ => None,
        }
    }
}

impl fmt::Display for MagicLinkIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: Uuid,
    pub token_hash: String,
    pub email: String,
    pub tenant_id: Uuid,
    pub intent: MagicLinkIntent,
    /// Relative path the client returns to after verification.
    pub redirect_to: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMagicLink {
    pub token_hash: String,
    pub email: String,
    pub tenant_id: Uuid,
    pub intent: MagicLinkIntent,
    pub redirect_to: Option<String>,
    pub expires_at: DateTime<Utc>,
}
