//! # Audit Log
//!
//! Append-only record of staff actions on orders and tables. Entries are
//! written by the order and table repositories inside the transaction of
//! the change they describe, so a rolled-back change leaves no entry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Entity kinds recorded in `audit_log.entity_type`.
pub const ENTITY_ORDER: &str = "order";
pub const ENTITY_TABLE: &str = "table";

/// One audit row.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub user_id: String,
    /// e.g. `status_changed`, `payment_recorded`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    user_id: String,
    action: String,
    entity_type: String,
    entity_id: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> DbResult<Self> {
        Ok(AuditEntry {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: serde_json::from_str(&row.details)?,
            created_at: row.created_at,
        })
    }
}

/// Appends an entry on `conn`, normally an open transaction.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    user_id: &str,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    details: Value,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, user_id, action, entity_type, entity_id, details, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(details.to_string())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Read side of the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Entries for one entity, oldest first.
    pub async fn for_entity(&self, entity_type: &str, entity_id: &str) -> DbResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, details, created_at
            FROM audit_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        record(&mut *conn, "u1", "status_changed", ENTITY_ORDER, "o1", json!({"to": "ready"}))
            .await
            .unwrap();
        record(&mut *conn, "u2", "transferred", ENTITY_TABLE, "t1", json!({}))
            .await
            .unwrap();
        drop(conn);

        let entries = db.audit().for_entity(ENTITY_ORDER, "o1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "u1");
        assert_eq!(entries[0].details["to"], "ready");
        assert!(db.audit().for_entity(ENTITY_ORDER, "t1").await.unwrap().is_empty());
    }
}
