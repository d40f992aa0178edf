//! SurrealDB connection management.
//!
//! The endpoint scheme picks the engine: `mem://` for an in-process
//! store, `ws://host:port` for a remote server.

use gms_core::config::DirectoryConfig;
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::directory::SurrealDirectory;
use crate::error::DbError;

/// Root credentials for a remote server.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., `ws://127.0.0.1:8000` or `mem://`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Signs in as root when set; embedded stores need none.
    pub credentials: Option<Credentials>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "gms".into(),
            database: "directory".into(),
            credentials: Some(Credentials {
                username: "root".into(),
                password: "root".into(),
            }),
        }
    }
}

impl DbConfig {
    /// A fresh in-process store, used by tests and local tooling.
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".into(),
            credentials: None,
            ..Self::default()
        }
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Connect to the endpoint in `config`, sign in when credentials are
    /// given, and select the configured namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = any::connect(config.url.as_str()).await?;

        if let Some(credentials) = &config.credentials {
            db.signin(Root {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Apply pending migrations and return a connector for the group
    /// directory laid out as `config` describes.
    pub async fn directory(&self, config: DirectoryConfig) -> Result<SurrealDirectory<Any>, DbError> {
        SurrealDirectory::migrated(self.db.clone(), config).await
    }
}
