//! SurrealDB implementation of [`MagicLinkRepository`].

use chrono::{DateTime, Utc};
use ripple_core::error::RippleResult;
use ripple_core::models::magic_link::{CreateMagicLink, MagicLink, MagicLinkIntent};
use ripple_core::models::user::normalize_email;
use ripple_core::repository::MagicLinkRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

const SELECT_LINK: &str = "SELECT meta::id(id) AS record_id, * FROM";

#[derive(Debug, SurrealValue)]
struct MagicLinkRow {
    record_id: String,
    token_hash: String,
    email: String,
    tenant_id: String,
    intent: String,
    redirect_to: Option<String>,
    expires_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MagicLinkRow {
    fn try_into_link(self) -> Result<MagicLink, DbError> {
        let intent = MagicLinkIntent::parse(&self.intent).ok_or_else(|| {
            DbError::invalid_row("magic_link", format!("unknown intent: {}", self.intent))
        })?;
        Ok(MagicLink {
            id: parse_uuid("magic_link", "record", &self.record_id)?,
            token_hash: self.token_hash,
            email: self.email,
            tenant_id: parse_uuid("magic_link", "tenant", &self.tenant_id)?,
            intent,
            redirect_to: self.redirect_to,
            expires_at: self.expires_at,
            used: self.used,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the magic link repository.
#[derive(Clone)]
pub struct SurrealMagicLinkRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMagicLinkRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MagicLinkRepository for SurrealMagicLinkRepository<C> {
    async fn create(&self, input: CreateMagicLink) -> RippleResult<MagicLink> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "CREATE type::record('magic_link', $id) SET \
                 token_hash = $token_hash, email = $email, \
                 tenant_id = $tenant_id, intent = $intent, \
                 redirect_to = $redirect_to, expires_at = $expires_at, \
                 used = false, used_at = NONE; ",
            )
            .query(format!("{SELECT_LINK} type::record('magic_link', $id)"))
            .bind(("id", id_str.clone()))
            .bind(("token_hash", input.token_hash))
            .bind(("email", normalize_email(&input.email)))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("intent", input.intent.as_str()))
            .bind(("redirect_to", input.redirect_to))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(|e| DbError::from_statement("magic_link", e))?
            .check()
            .map_err(|e| DbError::from_statement("magic_link", e))?;

        let rows: Vec<MagicLinkRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("magic_link", id_str))?;

        Ok(row.try_into_link()?)
    }

    async fn consume(&self, token_hash: &str, email: &str) -> RippleResult<MagicLink> {
        // A single conditional UPDATE is atomic: of two racing callers only
        // one sees the row still unused.
        let mut result = self
            .db
            .query(
                "UPDATE magic_link SET used = true, used_at = time::now() \
                 WHERE token_hash = $token_hash AND email = $email \
                 AND used = false AND expires_at > time::now() \
                 RETURN meta::id(id) AS record_id, token_hash, email, \
                 tenant_id, intent, redirect_to, expires_at, used, \
                 used_at, created_at",
            )
            .bind(("token_hash", token_hash.to_string()))
            .bind(("email", normalize_email(email)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MagicLinkRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::Gone {
            reason: "magic link is invalid, expired or already used".into(),
        })?;

        Ok(row.try_into_link()?)
    }
}
