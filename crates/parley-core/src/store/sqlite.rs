//! SQLite document store
//!
//! Provides connection pool management, schema migrations, and a
//! [`DocumentStore`] implementation that keeps one JSON document per row.
//! Useful as a self-hosted or offline backing store with the same contract
//! as the hosted one.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::DocumentStore;
use crate::{Error, Result};

/// Default maximum connections in the pool
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: document table
///
/// One row per top-level node; `body` holds the node's JSON verbatim so the
/// stored record shapes stay identical across backends.
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        key TEXT PRIMARY KEY NOT NULL,
        body TEXT NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at);
"#;

/// Database configuration options
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Whether to run migrations automatically
    pub auto_migrate: bool,
    /// Journal mode (default: WAL for better concurrency)
    pub journal_mode: SqliteJournalMode,
    /// Synchronous mode (default: NORMAL for balance of safety/performance)
    pub synchronous: SqliteSynchronous,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: true,
            journal_mode: SqliteJournalMode::Wal,
            synchronous: SqliteSynchronous::Normal,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database config with the specified path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a config for an in-memory database (useful for testing)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            auto_migrate: true,
            journal_mode: SqliteJournalMode::Wal,
            synchronous: SqliteSynchronous::Normal,
        }
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Disable automatic migrations
    pub fn no_migrate(mut self) -> Self {
        self.auto_migrate = false;
        self
    }
}

/// Get the default database path
pub fn default_database_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("parley").join("parley.db")
    } else {
        PathBuf::from("parley.db")
    }
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    config: DatabaseConfig,
}

impl Database {
    /// Create a new database connection with the given configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.exists() && config.path.to_string_lossy() != ":memory:" {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_str = if config.path.to_string_lossy() == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", config.path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connection_str)?
            .journal_mode(config.journal_mode)
            .synchronous(config.synchronous)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options)
            .await?;

        let db = Self {
            pool,
            config: config.clone(),
        };

        if config.auto_migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Create a database connection with default configuration
    pub async fn open_default() -> Result<Self> {
        Self::new(DatabaseConfig::default()).await
    }

    /// Create an in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self> {
        Self::new(DatabaseConfig::in_memory()).await
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_MIGRATIONS_TABLE).execute(&self.pool).await?;

        // MAX over an empty table yields one NULL row
        let (applied,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let applied = applied.unwrap_or(0);

        if applied < CURRENT_VERSION {
            let mut tx = self.pool.begin().await?;
            sqlx::query(MIGRATION_V1).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                .bind(CURRENT_VERSION)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        Ok(())
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite-backed [`DocumentStore`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Wrap an open database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) a store at the given path
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(Database::new(DatabaseConfig::with_path(path)).await?))
    }

    /// Open an in-memory store (useful for testing)
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::in_memory().await?))
    }

    /// The wrapped database
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                let value = serde_json::from_str(&body)
                    .map_err(|e| Error::Decode(format!("document {key}: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let body = serde_json::to_string(&value)?;

        sqlx::query(
            r#"
            INSERT INTO documents (key, body, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                body = excluded.body,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(body)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}
