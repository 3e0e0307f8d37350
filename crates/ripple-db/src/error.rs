//! Database-specific error types and conversions.

use ripple_core::error::RippleError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String },

    #[error("Record is no longer usable: {reason}")]
    Gone { reason: String },

    #[error("Tenant is not active")]
    TenantSuspended,

    #[error("Malformed {entity} row: {message}")]
    InvalidRow { entity: String, message: String },
}

impl DbError {
    pub(crate) fn invalid_row(entity: &str, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Classify a failed statement, turning unique-index violations into
    /// [`DbError::Conflict`].
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            Self::Conflict {
                entity: entity.into(),
            }
        } else {
            Self::Surreal(err)
        }
    }
}

impl From<DbError> for RippleError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => RippleError::NotFound { entity, id },
            DbError::Conflict { entity } => RippleError::Conflict { entity },
            DbError::Gone { reason } => RippleError::Gone { reason },
            DbError::TenantSuspended => RippleError::TenantSuspended,
            other => RippleError::Database(other.to_string()),
        }
    }
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(entity: &str, field: &str, raw: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw)
        .map_err(|e| DbError::invalid_row(entity, format!("invalid {field} UUID: {e}")))
}
