//! SurrealDB implementation of [`PermissionRepository`].
//!
//! The optional team is stored as a `team_key` string so that the natural
//! key (tenant, user, team, module, action) can carry a UNIQUE index:
//! [`NO_TEAM`] stands for "applies regardless of team".

use chrono::{DateTime, Utc};
use ripple_core::error::RippleResult;
use ripple_core::models::permission::{
    Action, Module, PermissionOverride, Polarity, SetPermissionOverride,
};
use ripple_core::repository::PermissionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

const NO_TEAM: &str = "*";

const SELECT_OVERRIDE: &str = "SELECT meta::id(id) AS record_id, * FROM";

fn team_key(team_id: Option<Uuid>) -> String {
    team_id.map_or_else(|| NO_TEAM.to_string(), |t| t.to_string())
}

#[derive(Debug, SurrealValue)]
struct OverrideRow {
    record_id: String,
    tenant_id: String,
    user_id: String,
    team_key: String,
    module: String,
    action: String,
    polarity: String,
    created_at: DateTime<Utc>,
}

impl OverrideRow {
    fn try_into_override(self) -> Result<PermissionOverride, DbError> {
        let team_id = match self.team_key.as_str() {
            NO_TEAM => None,
            raw => Some(parse_uuid("permission_override", "team", raw)?),
        };
        let module = Module::parse(&self.module).ok_or_else(|| {
            DbError::invalid_row("permission_override", format!("unknown module: {}", self.module))
        })?;
        let action = Action::parse(&self.action).ok_or_else(|| {
            DbError::invalid_row("permission_override", format!("unknown action: {}", self.action))
        })?;
        let polarity = Polarity::parse(&self.polarity).ok_or_else(|| {
            DbError::invalid_row(
                "permission_override",
                format!("unknown polarity: {}", self.polarity),
            )
        })?;

        Ok(PermissionOverride {
            id: parse_uuid("permission_override", "record", &self.record_id)?,
            tenant_id: parse_uuid("permission_override", "tenant", &self.tenant_id)?,
            user_id: parse_uuid("permission_override", "user", &self.user_id)?,
            team_id,
            module,
            action,
            polarity,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the permission override repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        team_id: Option<Uuid>,
    ) -> RippleResult<Vec<PermissionOverride>> {
        let mut keys = vec![NO_TEAM.to_string()];
        if let Some(team) = team_id {
            keys.push(team.to_string());
        }

        let mut result = self
            .db
            .query(format!(
                "{SELECT_OVERRIDE} permission_override \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 AND team_key IN $team_keys ORDER BY created_at ASC"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("team_keys", keys))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OverrideRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(OverrideRow::try_into_override)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn set(&self, input: SetPermissionOverride) -> RippleResult<PermissionOverride> {
        // Upsert on the natural key: flip the polarity of an existing row or
        // create a fresh one.
        let mut result = self
            .db
            .query(
                "LET $existing = (SELECT VALUE id FROM permission_override \
                     WHERE tenant_id = $tenant_id AND user_id = $user_id \
                     AND team_key = $team_key AND module = $module \
                     AND action = $action); \
                 IF array::len($existing) = 0 { \
                     CREATE type::record('permission_override', $id) SET \
                         tenant_id = $tenant_id, user_id = $user_id, \
                         team_key = $team_key, module = $module, \
                         action = $action, polarity = $polarity; \
                 } ELSE { \
                     UPDATE $existing SET polarity = $polarity; \
                 }; ",
            )
            .query(format!(
                "{SELECT_OVERRIDE} permission_override \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 AND team_key = $team_key AND module = $module \
                 AND action = $action"
            ))
            .bind(("id", Uuid::new_v4().to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("team_key", team_key(input.team_id)))
            .bind(("module", input.module.as_str()))
            .bind(("action", input.action.as_str()))
            .bind(("polarity", input.polarity.as_str()))
            .await
            .map_err(|e| DbError::from_statement("permission_override", e))?
            .check()
            .map_err(|e| DbError::from_statement("permission_override", e))?;

        let rows: Vec<OverrideRow> = result.take(2).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| {
            DbError::not_found(
                "permission_override",
                format!("{}:{}", input.module.as_str(), input.action.as_str()),
            )
        })?;

        Ok(row.try_into_override()?)
    }

    async fn remove(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        team_id: Option<Uuid>,
        module: Module,
        action: Action,
    ) -> RippleResult<()> {
        self.db
            .query(
                "DELETE permission_override \
                 WHERE tenant_id = $tenant_id AND user_id = $user_id \
                 AND team_key = $team_key AND module = $module \
                 AND action = $action",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("team_key", team_key(team_id)))
            .bind(("module", module.as_str()))
            .bind(("action", action.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }
}
