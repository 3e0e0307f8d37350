//! SurrealDB implementation of [`InviteRepository`].

use chrono::{DateTime, Utc};
use ripple_core::error::RippleResult;
use ripple_core::models::invite::{CreateInviteToken, InviteToken};
use ripple_core::models::user::{CreateUserProfile, UserProfile, normalize_email};
use ripple_core::repository::{InviteRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::user::{CREATE_PROFILE, bind_profile, fetch_profile, parse_role};
use crate::error::{DbError, parse_uuid};

const SELECT_INVITE: &str = "SELECT meta::id(id) AS record_id, * FROM";

#[derive(Debug, SurrealValue)]
struct InviteRow {
    record_id: String,
    token_hash: String,
    email: String,
    role: String,
    inviter_id: String,
    tenant_id: String,
    team_id: Option<String>,
    expires_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl InviteRow {
    fn try_into_invite(self) -> Result<InviteToken, DbError> {
        Ok(InviteToken {
            id: parse_uuid("invite_token", "record", &self.record_id)?,
            token_hash: self.token_hash,
            email: self.email,
            role: parse_role(&self.role)?,
            inviter_id: parse_uuid("invite_token", "inviter", &self.inviter_id)?,
            tenant_id: parse_uuid("invite_token", "tenant", &self.tenant_id)?,
            team_id: self
                .team_id
                .as_deref()
                .map(|raw| parse_uuid("invite_token", "team", raw))
                .transpose()?,
            expires_at: self.expires_at,
            used: self.used,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Flip `used` and create the profile in one transaction. The THROWs
/// abort the transaction when the tenant is not active or the token is no
/// longer consumable, so the profile is never written without the flag
/// flip and vice versa.
fn consume_statement() -> String {
    format!(
        "BEGIN TRANSACTION; \
         LET $active = (SELECT VALUE id FROM tenant \
             WHERE id = type::record('tenant', $tenant_id) AND status = 'Active'); \
         IF array::len($active) = 0 {{ THROW 'tenant is not active'; }}; \
         LET $consumed = (UPDATE invite_token \
             SET used = true, used_at = time::now() \
             WHERE token_hash = $token_hash AND tenant_id = $tenant_id \
             AND used = false AND expires_at > time::now()); \
         IF array::len($consumed) = 0 {{ THROW 'invite token is not consumable'; }}; \
         {CREATE_PROFILE}; \
         COMMIT TRANSACTION;"
    )
}

/// SurrealDB implementation of the invite token repository.
#[derive(Clone)]
pub struct SurrealInviteRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealInviteRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<InviteToken>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_INVITE} invite_token WHERE token_hash = $token_hash"
            ))
            .bind(("token_hash", token_hash.to_string()))
            .await?;
        let rows: Vec<InviteRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(InviteRow::try_into_invite)
            .transpose()
    }

    async fn tenant_is_active(&self, tenant_id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT VALUE status FROM type::record('tenant', $tenant_id)")
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let statuses: Vec<String> = result.take(0)?;
        Ok(statuses.first().is_some_and(|s| s == "Active"))
    }

    /// Explain why a consume transaction failed by re-reading the token
    /// and its tenant.
    async fn classify_failure(&self, token_hash: &str, err: surrealdb::Error) -> DbError {
        let invite = match self.find_by_hash(token_hash).await {
            Ok(Some(invite)) => invite,
            Ok(None) => return DbError::not_found("invite_token", "token"),
            Err(reread) => return reread,
        };
        match self.tenant_is_active(invite.tenant_id).await {
            Ok(false) => return DbError::TenantSuspended,
            Ok(true) => {}
            Err(reread) => return reread,
        }
        if invite.used {
            DbError::Gone {
                reason: "invite has already been used".into(),
            }
        } else if invite.is_expired_at(Utc::now()) {
            DbError::Gone {
                reason: "invite has expired".into(),
            }
        } else {
            DbError::from_statement("user_profile", err)
        }
    }
}

impl<C: Connection> InviteRepository for SurrealInviteRepository<C> {
    async fn create(&self, input: CreateInviteToken) -> RippleResult<InviteToken> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('invite_token', $id) SET \
                 token_hash = $token_hash, email = $email, role = $role, \
                 inviter_id = $inviter_id, tenant_id = $tenant_id, \
                 team_id = $team_id, expires_at = $expires_at, \
                 used = false, used_at = NONE; ",
            )
            .query(format!(
                "{SELECT_INVITE} type::record('invite_token', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("token_hash", input.token_hash))
            .bind(("email", normalize_email(&input.email)))
            .bind(("role", input.role.as_str()))
            .bind(("inviter_id", input.inviter_id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("team_id", input.team_id.map(|t| t.to_string())))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(|e| DbError::from_statement("invite_token", e))?
            .check()
            .map_err(|e| DbError::from_statement("invite_token", e))?;

        let rows: Vec<InviteRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("invite_token", id_str))?;

        Ok(row.try_into_invite()?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> RippleResult<InviteToken> {
        self.find_by_hash(token_hash)
            .await?
            .ok_or_else(|| DbError::not_found("invite_token", "token").into())
    }

    async fn consume(
        &self,
        token_hash: &str,
        profile: CreateUserProfile,
    ) -> RippleResult<UserProfile> {
        let user_id = Uuid::new_v4();
        let statement = consume_statement();

        let query = self
            .db
            .query(statement.as_str())
            .bind(("token_hash", token_hash.to_string()));
        let outcome = match bind_profile(query, user_id, profile).await {
            Ok(response) => response.check().map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(err) = outcome {
            debug!(error = %err, "invite consume transaction aborted");
            return Err(self.classify_failure(token_hash, err).await.into());
        }

        Ok(fetch_profile(&self.db, user_id).await?)
    }

    async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> RippleResult<PaginatedResult<InviteToken>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM invite_token \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "{SELECT_INVITE} invite_token WHERE tenant_id = $tenant_id \
                 ORDER BY created_at DESC LIMIT $limit START $offset"
            ))
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<InviteRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(InviteRow::try_into_invite)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
