//! # Store Handle
//!
//! Opens the SQLite file, applies the schema, and hands out repositories.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   handler A ──┐                       ┌── reads (WAL snapshot)          │
//! │   handler B ──┼──► SqlitePool ──► conn┤                                 │
//! │   handler C ──┘   (max_connections)   └── BEGIN; UPDATE orders          │
//! │                                             SET version = version + 1   │
//! │                                             ── write lock held ──       │
//! │                                             re-read, decide, write      │
//! │                                           COMMIT                        │
//! │                                                                         │
//! │   A second writer waits up to busy_timeout, then surfaces as            │
//! │   DbError::Conflict (retryable).                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::migrations;
use crate::repository::audit::AuditRepository;
use crate::repository::menu::MenuRepository;
use crate::repository::order::OrderRepository;
use crate::repository::table::TableRepository;

const MEMORY: &str = ":memory:";

/// Where the store lives and how hard it may be pushed.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    /// Default 5. In-memory stores always use one.
    pub max_connections: u32,
    /// Pool checkout timeout.
    pub acquire_timeout: Duration,
    /// Writer wait on a held lock. Default 5 s.
    pub busy_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Throwaway store for tests.
    ///
    /// Every `:memory:` connection is its own database, so the pool is
    /// pinned to one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }

    fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = if self.is_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

/// Shared store handle. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the store and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let max_connections = if config.is_memory() {
            1
        } else {
            config.max_connections.max(1)
        };

        let mut options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout);
        if config.is_memory() {
            // A recycled connection would come back empty.
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect_with(config.connect_options()).await?;

        info!(
            path = %config.database_path.display(),
            max_connections,
            "Store opened"
        );

        migrations::apply(&pool).await?;
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Menu catalogue and modifier options.
    pub fn menu(&self) -> MenuRepository {
        MenuRepository::new(self.pool.clone())
    }

    /// Orders, lines and payments.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// The Table Registry.
    pub fn tables(&self) -> TableRepository {
        TableRepository::new(self.pool.clone())
    }

    /// Staff actions on orders and tables.
    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing store");
        self.pool.close().await;
    }

    /// True when the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
        assert_eq!(
            migrations::applied_count(db.pool()).await.unwrap(),
            migrations::embedded_count()
        );
    }

    #[tokio::test]
    async fn test_file_store_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("bistro.db")).max_connections(3))
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/bistro.db")
            .max_connections(8)
            .busy_timeout(Duration::from_millis(250));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.is_memory());
        assert!(DbConfig::in_memory().is_memory());
    }
}
