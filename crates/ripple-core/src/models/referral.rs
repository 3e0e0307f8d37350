//! Referral relationship domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only edge of the referral tree: `referrer` brought in `referee`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRelationship {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referee_id: Uuid,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
}
