//! # Schema Migrations
//!
//! The schema ships inside the binary: `sqlx::migrate!` embeds every file in
//! the workspace `migrations/sqlite/` directory at compile time.
//!
//! ```text
//! Database::new ──► apply() ──► _sqlx_migrations ledger
//!                                 │
//!                                 ├── 001_initial_schema.sql
//!                                 │     menu_items, modifier_options,
//!                                 │     dining_tables, orders, order_items,
//!                                 │     payments, order_sequences
//!                                 ├── 002_audit_log.sql
//!                                 │     audit_log
//!                                 └── (next: 003_*.sql)
//! ```
//!
//! Applied files are checksummed. Never edit one; add `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies pending migrations. A no-op on an up-to-date database.
pub async fn apply(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Number of migrations recorded as applied.
pub async fn applied_count(pool: &SqlitePool) -> DbResult<usize> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    Ok(applied as usize)
}

/// Number of migrations embedded in this build.
pub fn embedded_count() -> usize {
    MIGRATOR.migrations.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_schema_tables_exist() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(db.pool())
                .await
                .unwrap();

        for table in [
            "audit_log",
            "dining_tables",
            "menu_items",
            "modifier_options",
            "order_items",
            "order_sequences",
            "orders",
            "payments",
        ] {
            assert!(names.iter().any(|n| n == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        apply(db.pool()).await.unwrap();
        assert_eq!(applied_count(db.pool()).await.unwrap(), embedded_count());
    }
}
