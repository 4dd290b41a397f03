//! SurrealDB connection management.

use std::fmt;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;
use crate::store::SurrealStore;

/// Configuration for connecting to SurrealDB.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
    /// Optional secret mixed into staff password hashes.
    pub password_pepper: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "clinicore".into(),
            database: "records".into(),
            username: "root".into(),
            password: "root".into(),
            password_pepper: None,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// An open, migrated SurrealDB connection.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
    pepper: Option<String>,
}

impl DbManager {
    /// Connect, sign in as root, select the namespace and database, and
    /// apply any pending migrations.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        run_migrations(&db).await?;
        info!(peppered = config.password_pepper.is_some(), "SurrealDB ready");

        Ok(Self {
            db,
            pepper: config.password_pepper.clone(),
        })
    }

    /// The repository bundle over this connection.
    pub fn store(&self) -> SurrealStore<Client> {
        match &self.pepper {
            Some(pepper) => SurrealStore::with_pepper(self.db.clone(), pepper.clone()),
            None => SurrealStore::new(self.db.clone()),
        }
    }
}
