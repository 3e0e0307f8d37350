//! Permission vocabulary and per-user override records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Functional area of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Dashboard,
    Referrals,
    Commissions,
    Customers,
    TeamManagement,
    UserManagement,
    Invitations,
    Reports,
    Settings,
    Billing,
}

impl Module {
    pub const ALL: [Module; 10] = [
        Module::Dashboard,
        Module::Referrals,
        Module::Commissions,
        Module::Customers,
        Module::TeamManagement,
        Module::UserManagement,
        Module::Invitations,
        Module::Reports,
        Module::Settings,
        Module::Billing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Referrals => "referrals",
            Self::Commissions => "commissions",
            Self::Customers => "customers",
            Self::TeamManagement => "team_management",
            Self::UserManagement => "user_management",
            Self::Invitations => "invitations",
            Self::Reports => "reports",
            Self::Settings => "settings",
            Self::Billing => "billing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Manage,
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Manage,
        Action::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Manage => "manage",
            Self::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// A `(module, action)` pair, rendered as `module:action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub module: Module,
    pub action: Action,
}

impl PermissionKey {
    pub const fn new(module: Module, action: Action) -> Self {
        Self { module, action }
    }

    /// Parse `module:action` (e.g., `team_management:manage`).
    pub fn parse(s: &str) -> Option<Self> {
        let (module, action) = s.split_once(':')?;
        Some(Self::new(Module::parse(module)?, Action::parse(action)?))
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module.as_str(), self.action.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Granted,
    Denied,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(Self::Granted),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

/// A custom grant or denial layered over a role's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionOverride {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// `None` applies regardless of the user's team.
    pub team_id: Option<Uuid>,
    pub module: Module,
    pub action: Action,
    pub polarity: Polarity,
    pub created_at: DateTime<Utc>,
}

impl PermissionOverride {
    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(self.module, self.action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPermissionOverride {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub module: Module,
    pub action: Action,
    pub polarity: Polarity,
}
