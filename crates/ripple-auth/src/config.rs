//! Authentication configuration.

use chrono::Duration;

/// Upper bound on magic link lifetime regardless of configuration.
pub const MAX_MAGIC_LINK_LIFETIME_SECS: u64 = 900;

/// Configuration for the auth services.
///
/// Built once at startup by the server and handed to every service; no
/// code in this crate reads the environment.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Enables the development session bypass. When false the dev cookie
    /// is ignored even if correctly signed.
    pub dev_mode: bool,
    /// HMAC secret for development session cookies (HS256).
    pub dev_session_secret: String,
    /// Session lifetime in seconds (default: 604_800 = 7 days).
    pub session_lifetime_secs: u64,
    /// Invite lifetime in seconds (default: 604_800 = 7 days).
    pub invite_lifetime_secs: u64,
    /// Magic link lifetime in seconds, capped at 15 minutes.
    pub magic_link_lifetime_secs: u64,
    /// Public base URL of the web application (no trailing slash).
    pub app_base_url: String,
    /// Base URL referral links are built on (e.g., `https://app.example/r`).
    pub referral_base_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            dev_session_secret: String::new(),
            session_lifetime_secs: 604_800,
            invite_lifetime_secs: 604_800,
            magic_link_lifetime_secs: MAX_MAGIC_LINK_LIFETIME_SECS,
            app_base_url: "http://localhost:3000".into(),
            referral_base_url: "http://localhost:3000/r".into(),
        }
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_lifetime_secs as i64)
    }

    pub fn invite_ttl(&self) -> Duration {
        Duration::seconds(self.invite_lifetime_secs as i64)
    }

    /// `min(configured, 15 minutes)`.
    pub fn magic_link_ttl(&self) -> Duration {
        Duration::seconds(
            self.magic_link_lifetime_secs
                .min(MAX_MAGIC_LINK_LIFETIME_SECS) as i64,
        )
    }

    /// `app_base_url` joined with `path`, tolerating a trailing slash.
    pub fn app_url(&self, path: &str) -> String {
        format!("{}{}", self.app_base_url.trim_end_matches('/'), path)
    }
}
