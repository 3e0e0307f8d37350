//! SurrealDB implementation of [`ReferralRepository`].

use chrono::{DateTime, Utc};
use ripple_core::error::RippleResult;
use ripple_core::models::referral::ReferralRelationship;
use ripple_core::models::user::{CreateUserProfile, UserProfile};
use ripple_core::repository::ReferralRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::user::{CREATE_PROFILE, bind_profile, fetch_profile};
use crate::error::{DbError, parse_uuid};

const SELECT_REFERRAL: &str = "SELECT meta::id(id) AS record_id, * FROM";

#[derive(Debug, SurrealValue)]
struct ReferralRow {
    record_id: String,
    referrer_id: String,
    referee_id: String,
    tenant_id: String,
    created_at: DateTime<Utc>,
}

impl ReferralRow {
    fn try_into_referral(self) -> Result<ReferralRelationship, DbError> {
        Ok(ReferralRelationship {
            id: parse_uuid("referral", "record", &self.record_id)?,
            referrer_id: parse_uuid("referral", "referrer", &self.referrer_id)?,
            referee_id: parse_uuid("referral", "referee", &self.referee_id)?,
            tenant_id: parse_uuid("referral", "tenant", &self.tenant_id)?,
            created_at: self.created_at,
        })
    }
}

fn signup_statement() -> String {
    format!(
        "BEGIN TRANSACTION; \
         {CREATE_PROFILE}; \
         CREATE type::record('referral', $referral_id) SET \
             referrer_id = $referrer_id, referee_id = $user_id, \
             tenant_id = $tenant_id; \
         COMMIT TRANSACTION;"
    )
}

/// SurrealDB implementation of the referral repository.
#[derive(Clone)]
pub struct SurrealReferralRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealReferralRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_many(
        &self,
        filter: &str,
        tenant_id: Uuid,
        other: (&'static str, String),
    ) -> Result<Vec<ReferralRelationship>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_REFERRAL} referral WHERE tenant_id = $tenant_id \
                 AND {filter} ORDER BY created_at ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(other)
            .await?;
        let rows: Vec<ReferralRow> = result.take(0)?;
        rows.into_iter()
            .map(ReferralRow::try_into_referral)
            .collect()
    }
}

impl<C: Connection> ReferralRepository for SurrealReferralRepository<C> {
    async fn create_referred_user(
        &self,
        referrer_id: Uuid,
        profile: CreateUserProfile,
    ) -> RippleResult<(UserProfile, ReferralRelationship)> {
        let user_id = Uuid::new_v4();
        let referral_id = Uuid::new_v4();
        let tenant_id = profile.tenant_id;
        let statement = signup_statement();

        let query = self
            .db
            .query(statement.as_str())
            .bind(("referral_id", referral_id.to_string()))
            .bind(("referrer_id", referrer_id.to_string()));
        bind_profile(query, user_id, profile)
            .await
            .map_err(|e| DbError::from_statement("user_profile", e))?
            .check()
            .map_err(|e| DbError::from_statement("user_profile", e))?;

        let user = fetch_profile(&self.db, user_id).await?;
        let relationship = self.get_by_referee(tenant_id, user_id).await?;
        Ok((user, relationship))
    }

    async fn list_by_referrer(
        &self,
        tenant_id: Uuid,
        referrer_id: Uuid,
    ) -> RippleResult<Vec<ReferralRelationship>> {
        Ok(self
            .fetch_many(
                "referrer_id = $referrer_id",
                tenant_id,
                ("referrer_id", referrer_id.to_string()),
            )
            .await?)
    }

    async fn get_by_referee(
        &self,
        tenant_id: Uuid,
        referee_id: Uuid,
    ) -> RippleResult<ReferralRelationship> {
        self.fetch_many(
            "referee_id = $referee_id",
            tenant_id,
            ("referee_id", referee_id.to_string()),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DbError::not_found("referral", referee_id.to_string()).into())
    }
}
