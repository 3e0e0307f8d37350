//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

/// URL scheme of the in-process memory engine.
const MEMORY_SCHEME: &str = "mem://";

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., `ws://127.0.0.1:8000` or `mem://`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; unused by the memory engine.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "ripple".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// A throwaway in-process database, for tests and local demos.
    pub fn in_memory(namespace: &str, database: &str) -> Self {
        Self {
            url: MEMORY_SCHEME.into(),
            namespace: namespace.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Remote engines need a root sign-in before a namespace can be
    /// selected. The memory engine has no users.
    pub fn requires_signin(&self) -> bool {
        !self.url.starts_with(MEMORY_SCHEME)
    }
}

/// Owns the shared client handle for the process.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Open the engine named by `config.url`, sign in when the engine needs
    /// it, and select the configured namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "connecting to SurrealDB"
        );

        let db = any::connect(config.url.as_str()).await?;
        if config.requires_signin() {
            db.signin(Root {
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .await?;
        }
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("connected to SurrealDB");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
