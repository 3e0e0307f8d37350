//! Invite token domain model.
//!
//! Only the SHA-256 hash of an invite token is persisted; the raw value
//! is handed to the inviter once and travels in the accept link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use super::tenant::TenantStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteToken {
    pub id: Uuid,
    pub token_hash: String,
    pub email: String,
    /// Role granted on acceptance.
    pub role: Role,
    pub inviter_id: Uuid,
    /// The inviter's tenant; the accepted profile lands here.
    pub tenant_id: Uuid,
    pub team_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    /// Monotonic: once true it never returns to false.
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Derived view of an invite at a point in time. Only `used` is stored;
/// the other states are computed from the record and its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InviteState {
    Valid,
    Expired,
    Used,
    TenantSuspended,
}

impl InviteToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Used wins over expired, expired wins over a suspended tenant.
    pub fn state_at(&self, now: DateTime<Utc>, tenant_status: TenantStatus) -> InviteState {
        if self.used {
            InviteState::Used
        } else if self.is_expired_at(now) {
            InviteState::Expired
        } else if tenant_status == TenantStatus::Suspended {
            InviteState::TenantSuspended
        } else {
            InviteState::Valid
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInviteToken {
    pub token_hash: String,
    pub email: String,
    pub role: Role,
    pub inviter_id: Uuid,
    pub tenant_id: Uuid,
    pub team_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}
