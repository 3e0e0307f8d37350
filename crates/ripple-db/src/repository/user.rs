//! SurrealDB implementation of [`UserRepository`].
//!
//! Emails are stored lower-cased and usernames carry a lower-cased
//! `username_key` column so that both uniqueness and lookups are
//! case-insensitive.

use chrono::{DateTime, Utc};
use ripple_core::error::RippleResult;
use ripple_core::models::role::Role;
use ripple_core::models::user::{
    CreateUserProfile, UpdateUserProfile, UserProfile, normalize_email,
};
use ripple_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::method::Query;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

pub(crate) const SELECT_PROFILE: &str = "SELECT meta::id(id) AS record_id, * FROM";

/// `CREATE` statement shared by plain signups, invite acceptance and
/// referred signups. Bind with [`bind_profile`].
pub(crate) const CREATE_PROFILE: &str = "\
CREATE type::record('user_profile', $user_id) SET \
    tenant_id = $tenant_id, \
    external_identity_id = $external_identity_id, \
    username = $username, username_key = $username_key, \
    email = $email, display_name = $display_name, \
    team_id = $team_id, role = $role, \
    referral_code = $referral_code, \
    lineage_path = $lineage_path, \
    invite_verified = $invite_verified";

#[derive(Debug, SurrealValue)]
pub(crate) struct ProfileRow {
    record_id: String,
    tenant_id: String,
    external_identity_id: String,
    username: String,
    email: String,
    display_name: Option<String>,
    team_id: Option<String>,
    role: String,
    referral_code: String,
    lineage_path: Vec<String>,
    invite_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn parse_role(s: &str) -> Result<Role, DbError> {
    Role::parse(s).ok_or_else(|| DbError::invalid_row("user_profile", format!("unknown role: {s}")))
}

impl ProfileRow {
    pub(crate) fn try_into_profile(self) -> Result<UserProfile, DbError> {
        let lineage_path = self
            .lineage_path
            .iter()
            .map(|raw| parse_uuid("user_profile", "lineage", raw))
            .collect::<Result<Vec<_>, _>>()?;
        let team_id = self
            .team_id
            .as_deref()
            .map(|raw| parse_uuid("user_profile", "team", raw))
            .transpose()?;

        Ok(UserProfile {
            id: parse_uuid("user_profile", "record", &self.record_id)?,
            external_identity_id: self.external_identity_id,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            tenant_id: parse_uuid("user_profile", "tenant", &self.tenant_id)?,
            team_id,
            role: parse_role(&self.role)?,
            referral_code: self.referral_code,
            lineage_path,
            invite_verified: self.invite_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Short public code, unrelated to any token.
fn generate_referral_code() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_ascii_uppercase()
}

/// Bind every parameter of [`CREATE_PROFILE`].
pub(crate) fn bind_profile<'r, C: Connection>(
    query: Query<'r, C>,
    id: Uuid,
    input: CreateUserProfile,
) -> Query<'r, C> {
    query
        .bind(("user_id", id.to_string()))
        .bind(("tenant_id", input.tenant_id.to_string()))
        .bind(("external_identity_id", input.external_identity_id))
        .bind(("username_key", input.username.to_lowercase()))
        .bind(("username", input.username))
        .bind(("email", normalize_email(&input.email)))
        .bind(("display_name", input.display_name))
        .bind(("team_id", input.team_id.map(|t| t.to_string())))
        .bind(("role", input.role.as_str()))
        .bind(("referral_code", generate_referral_code()))
        .bind((
            "lineage_path",
            input
                .lineage_path
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>(),
        ))
        .bind(("invite_verified", input.invite_verified))
}

/// Fetch a profile by record id without a tenant filter. Only used after
/// a write this crate just performed.
pub(crate) async fn fetch_profile<C: Connection>(
    db: &Surreal<C>,
    id: Uuid,
) -> Result<UserProfile, DbError> {
    let mut result = db
        .query(format!(
            "{SELECT_PROFILE} type::record('user_profile', $id)"
        ))
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<ProfileRow> = result.take(0)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::not_found("user_profile", id.to_string()))?
        .try_into_profile()
}

/// SurrealDB implementation of the user profile repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_many(&self, query: Query<'_, C>) -> Result<Vec<UserProfile>, DbError> {
        let mut result = query.await?;
        let rows: Vec<ProfileRow> = result.take(0)?;
        rows.into_iter()
            .map(ProfileRow::try_into_profile)
            .collect()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUserProfile) -> RippleResult<UserProfile> {
        let id = Uuid::new_v4();

        bind_profile(self.db.query(CREATE_PROFILE), id, input)
            .await
            .map_err(|e| DbError::from_statement("user_profile", e))?
            .check()
            .map_err(|e| DbError::from_statement("user_profile", e))?;

        Ok(fetch_profile(&self.db, id).await?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> RippleResult<UserProfile> {
        let query = self
            .db
            .query(format!(
                "{SELECT_PROFILE} type::record('user_profile', $id) \
                 WHERE tenant_id = $tenant_id"
            ))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        self.fetch_many(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user_profile", id.to_string()).into())
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> RippleResult<UserProfile> {
        let email = normalize_email(email);
        let query = self
            .db
            .query(format!(
                "{SELECT_PROFILE} user_profile \
                 WHERE tenant_id = $tenant_id AND email = $email"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email", email.clone()));

        self.fetch_many(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user_profile", format!("email={email}")).into())
    }

    async fn get_by_username(&self, username: &str) -> RippleResult<UserProfile> {
        let query = self
            .db
            .query(format!(
                "{SELECT_PROFILE} user_profile WHERE username_key = $key"
            ))
            .bind(("key", username.to_lowercase()));

        self.fetch_many(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user_profile", format!("username={username}")).into())
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> RippleResult<UserProfile> {
        let mut sets = Vec::new();
        if input.display_name.is_some() {
            sets.push("display_name = $display_name");
        }
        if input.team_id.is_some() {
            sets.push("team_id = $team_id");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.invite_verified.is_some() {
            sets.push("invite_verified = $invite_verified");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user_profile', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(display_name) = input.display_name {
            builder = builder.bind(("display_name", display_name));
        }
        if let Some(team_id) = input.team_id {
            builder = builder.bind(("team_id", team_id.map(|t| t.to_string())));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str()));
        }
        if let Some(verified) = input.invite_verified {
            builder = builder.bind(("invite_verified", verified));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        self.get_by_id(tenant_id, id).await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> RippleResult<PaginatedResult<UserProfile>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM user_profile \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let query = self
            .db
            .query(format!(
                "{SELECT_PROFILE} user_profile WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC LIMIT $limit START $offset"
            ))
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        Ok(PaginatedResult {
            items: self.fetch_many(query).await?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_descendants(
        &self,
        tenant_id: Uuid,
        ancestor_id: Uuid,
    ) -> RippleResult<Vec<UserProfile>> {
        let query = self
            .db
            .query(format!(
                "{SELECT_PROFILE} user_profile WHERE tenant_id = $tenant_id \
                 AND lineage_path CONTAINS $ancestor ORDER BY created_at ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("ancestor", ancestor_id.to_string()));

        Ok(self.fetch_many(query).await?)
    }
}
