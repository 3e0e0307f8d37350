//! Authenticated identity carried through a request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use super::user::UserProfile;

/// Canonical identity a credential resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub team_id: Option<Uuid>,
}

impl From<&UserProfile> for Identity {
    fn from(user: &UserProfile) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            tenant_id: user.tenant_id,
            team_id: user.team_id,
        }
    }
}

impl Identity {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}
