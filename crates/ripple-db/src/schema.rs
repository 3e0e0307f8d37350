//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. UUIDs are stored as strings and enums as
//! strings with ASSERT constraints. Uniqueness the services rely on
//! (slugs, per-tenant emails, usernames, token hashes) is backed by
//! UNIQUE indexes so that a racing duplicate fails in the store.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: tenants, profiles, single-use tokens, referrals, overrides
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD domain ON TABLE tenant TYPE option<string>;
DEFINE FIELD status ON TABLE tenant TYPE string \
    ASSERT $value IN ['Active', 'Suspended'];
DEFINE FIELD plan ON TABLE tenant TYPE string \
    ASSERT $value IN ['Free', 'Pro', 'Enterprise'];
DEFINE FIELD primary_color ON TABLE tenant TYPE option<string>;
DEFINE FIELD secondary_color ON TABLE tenant TYPE option<string>;
DEFINE FIELD logo_url ON TABLE tenant TYPE option<string>;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- User profiles (tenant scope)
-- =======================================================================
DEFINE TABLE user_profile SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user_profile TYPE string;
DEFINE FIELD external_identity_id ON TABLE user_profile TYPE string;
DEFINE FIELD username ON TABLE user_profile TYPE string;
DEFINE FIELD username_key ON TABLE user_profile TYPE string;
DEFINE FIELD email ON TABLE user_profile TYPE string;
DEFINE FIELD display_name ON TABLE user_profile TYPE option<string>;
DEFINE FIELD team_id ON TABLE user_profile TYPE option<string>;
DEFINE FIELD role ON TABLE user_profile TYPE string \
    ASSERT $value IN ['SUPER_ADMIN', 'ADMIN', 'EMPLOYEE', \
    'SALES_PERSON', 'CUSTOMER'];
DEFINE FIELD referral_code ON TABLE user_profile TYPE string;
DEFINE FIELD lineage_path ON TABLE user_profile TYPE array<string> \
    DEFAULT [];
DEFINE FIELD invite_verified ON TABLE user_profile TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE user_profile TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user_profile TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user_profile \
    COLUMNS tenant_id, email UNIQUE;
DEFINE INDEX idx_user_username ON TABLE user_profile \
    COLUMNS username_key UNIQUE;
DEFINE INDEX idx_user_referral_code ON TABLE user_profile \
    COLUMNS referral_code UNIQUE;

-- =======================================================================
-- Invite tokens (tenant scope, single use)
-- =======================================================================
DEFINE TABLE invite_token SCHEMAFULL;
DEFINE FIELD token_hash ON TABLE invite_token TYPE string;
DEFINE FIELD email ON TABLE invite_token TYPE string;
DEFINE FIELD role ON TABLE invite_token TYPE string \
    ASSERT $value IN ['SUPER_ADMIN', 'ADMIN', 'EMPLOYEE', \
    'SALES_PERSON', 'CUSTOMER'];
DEFINE FIELD inviter_id ON TABLE invite_token TYPE string;
DEFINE FIELD tenant_id ON TABLE invite_token TYPE string;
DEFINE FIELD team_id ON TABLE invite_token TYPE option<string>;
DEFINE FIELD expires_at ON TABLE invite_token TYPE datetime;
DEFINE FIELD used ON TABLE invite_token TYPE bool DEFAULT false;
DEFINE FIELD used_at ON TABLE invite_token TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE invite_token TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invite_token_hash ON TABLE invite_token \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_invite_tenant ON TABLE invite_token \
    COLUMNS tenant_id, created_at;

-- =======================================================================
-- Magic links (tenant scope, single use)
-- =======================================================================
DEFINE TABLE magic_link SCHEMAFULL;
DEFINE FIELD token_hash ON TABLE magic_link TYPE string;
DEFINE FIELD email ON TABLE magic_link TYPE string;
DEFINE FIELD tenant_id ON TABLE magic_link TYPE string;
DEFINE FIELD intent ON TABLE magic_link TYPE string \
    ASSERT $value IN ['sign_in', 'sign_up'];
DEFINE FIELD redirect_to ON TABLE magic_link TYPE option<string>;
DEFINE FIELD expires_at ON TABLE magic_link TYPE datetime;
DEFINE FIELD used ON TABLE magic_link TYPE bool DEFAULT false;
DEFINE FIELD used_at ON TABLE magic_link TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE magic_link TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_magic_link_hash ON TABLE magic_link \
    COLUMNS token_hash UNIQUE;

-- =======================================================================
-- Referral relationships (tenant scope, append-only)
-- =======================================================================
DEFINE TABLE referral SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD referrer_id ON TABLE referral TYPE string;
DEFINE FIELD referee_id ON TABLE referral TYPE string;
DEFINE FIELD tenant_id ON TABLE referral TYPE string;
DEFINE FIELD created_at ON TABLE referral TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_referral_referee ON TABLE referral \
    COLUMNS tenant_id, referee_id UNIQUE;
DEFINE INDEX idx_referral_referrer ON TABLE referral \
    COLUMNS tenant_id, referrer_id;

-- =======================================================================
-- Permission overrides (tenant scope)
-- =======================================================================
DEFINE TABLE permission_override SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE permission_override TYPE string;
DEFINE FIELD user_id ON TABLE permission_override TYPE string;
DEFINE FIELD team_key ON TABLE permission_override TYPE string;
DEFINE FIELD module ON TABLE permission_override TYPE string;
DEFINE FIELD action ON TABLE permission_override TYPE string \
    ASSERT $value IN ['view', 'create', 'edit', 'manage', 'delete'];
DEFINE FIELD polarity ON TABLE permission_override TYPE string \
    ASSERT $value IN ['granted', 'denied'];
DEFINE FIELD created_at ON TABLE permission_override TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_override_key ON TABLE permission_override \
    COLUMNS tenant_id, user_id, team_key, module, action UNIQUE;

-- =======================================================================
-- Sessions (tenant scope)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE session TYPE string;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE option<string>;
DEFINE FIELD user_agent ON TABLE session TYPE option<string>;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_user ON TABLE session \
    COLUMNS tenant_id, user_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Highest migration version recorded in `_migration`, or 0 on a fresh
/// database.
pub async fn schema_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    info!(
        version = migration.version,
        name = migration.name,
        "Applying migration"
    );

    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "v{} '{}' failed: {e}",
            migration.version, migration.name
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!("recording v{} failed: {e}", migration.version))
        })?;

    Ok(())
}

/// Bring the schema up to date, returning how many migrations ran.
///
/// The `_migration` tracking table is created on first run; every
/// migration newer than [`schema_version`] is then applied in order.
/// Calling this on an up-to-date database is a no-op.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = schema_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    for migration in &pending {
        apply(db, migration).await?;
    }

    if !pending.is_empty() {
        info!(
            from = current,
            to = MIGRATIONS.last().map(|m| m.version).unwrap_or(current),
            "Schema migrated"
        );
    }

    Ok(pending.len())
}

/// Raw DDL for schema version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
