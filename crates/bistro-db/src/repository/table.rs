//! # Table Registry
//!
//! Table occupancy with the at-most-one-active-order-per-table invariant.
//!
//! ## Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every occupancy change runs inside one transaction:                    │
//! │                                                                         │
//! │  1. UPDATE orders SET version = version + 1     ← write lock, first     │
//! │  2. SELECT order / tables                       ← re-read under lock    │
//! │  3. bistro-core rule check                      ← TableOccupied, ...    │
//! │  4. UPDATE dining_tables ... WHERE current_order_id IS NULL / = ?       │
//! │     rows_affected == 0 → Conflict                                       │
//! │  5. COMMIT                                                              │
//! │                                                                         │
//! │  Schema backstops: UNIQUE(current_order_id) and                         │
//! │  CHECK ((status = 'occupied') = (current_order_id IS NOT NULL))         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two concurrent transfers of the same order serialize on step 1; the loser
//! re-reads the order, sees it already moved and fails with `Conflict`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, ENTITY_TABLE};
use crate::repository::order::{fetch_order_header, lock_order};
use bistro_core::table::check_transfer;
use bistro_core::validation::{validate_seating, validate_table_shape};
use bistro_core::{CoreError, Table, TableStatus};

const TABLE_COLUMNS: &str =
    "id, number, name, section, capacity, status, current_order_id, created_at, updated_at";

/// Input for a new table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTable {
    pub number: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity: i64,
}

fn default_capacity() -> i64 {
    4
}

/// Result of a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TableTransfer {
    pub from: Table,
    pub to: Table,
}

/// Repository for the Table Registry.
#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
}

impl TableRepository {
    /// Creates a new TableRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TableRepository { pool }
    }

    /// Creates an available table.
    pub async fn create(&self, input: &NewTable) -> DbResult<Table> {
        validate_table_shape(input.number, input.capacity).map_err(CoreError::from)?;

        let now = Utc::now();
        let table = Table {
            id: Uuid::new_v4().to_string(),
            number: input.number,
            name: input.name.clone(),
            section: input.section.clone(),
            capacity: input.capacity,
            status: TableStatus::Available,
            current_order_id: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO dining_tables (
                id, number, name, section, capacity, status,
                current_order_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)
            "#,
        )
        .bind(&table.id)
        .bind(table.number)
        .bind(&table.name)
        .bind(&table.section)
        .bind(table.capacity)
        .bind(table.status)
        .bind(table.created_at)
        .bind(table.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("table number", input.number.to_string())
            }
            other => other,
        })?;

        info!(id = %table.id, number = table.number, "Table created");
        Ok(table)
    }

    /// Gets a table by ID.
    pub async fn get(&self, id: &str) -> DbResult<Table> {
        let mut conn = self.pool.acquire().await?;
        fetch_table(&mut *conn, id).await
    }

    /// Lists tables by number, optionally filtered by status.
    pub async fn list(&self, status: Option<TableStatus>) -> DbResult<Vec<Table>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM dining_tables \
             WHERE (?1 IS NULL OR status = ?1) ORDER BY number"
        );
        let tables = sqlx::query_as::<_, Table>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(tables)
    }

    /// Manual status change (reserved, dirty, maintenance, available).
    ///
    /// Never touches a table that holds an order.
    pub async fn set_status(&self, id: &str, status: TableStatus) -> DbResult<Table> {
        let mut tx = self.pool.begin().await?;

        let table = fetch_table(&mut *tx, id).await?;
        table.check_manual_status(status)?;

        let result = sqlx::query(
            r#"
            UPDATE dining_tables SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND current_order_id IS NULL
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(format!("table {} was assigned concurrently", id)));
        }

        let table = fetch_table(&mut *tx, id).await?;
        tx.commit().await?;

        debug!(id = %id, status = %status, "Table status changed");
        Ok(table)
    }

    /// Seats an open order at a table.
    ///
    /// ## Errors
    /// - `TableOccupied` if the table holds a different active order
    /// - `TableUnavailable` for dirty / maintenance tables
    /// - `Conflict` if the order already sits at another table (use transfer)
    /// - `OrderClosed` if the order is completed or cancelled
    /// - `Validation` if the order is not dine-in
    pub async fn assign(&self, table_id: &str, order_id: &str) -> DbResult<Table> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        lock_order(&mut *tx, order_id).await?;
        let order = fetch_order_header(&mut *tx, order_id).await?;
        order.ensure_open()?;
        validate_seating(order.order_type, Some(table_id)).map_err(CoreError::from)?;

        if let Some(current) = order.table_id.as_deref().filter(|t| *t != table_id) {
            let seated = fetch_table(&mut *tx, current).await?;
            if seated.current_order_id.as_deref() == Some(order_id) {
                return Err(DbError::Conflict(format!(
                    "order {} is seated at table {}; transfer it instead",
                    order_id, current
                )));
            }
        }

        let table = assign_in(&mut *tx, table_id, order_id, now).await?;
        set_order_table(&mut *tx, order_id, table_id, now).await?;
        tx.commit().await?;

        info!(table_id = %table_id, order_id = %order_id, "Table assigned");
        Ok(table)
    }

    /// Frees a table. A table that is already free is returned unchanged.
    pub async fn release(&self, table_id: &str) -> DbResult<Table> {
        let mut tx = self.pool.begin().await?;
        let (table, released) = release_in(&mut *tx, table_id, None, Utc::now()).await?;
        tx.commit().await?;

        if let Some(order_id) = released {
            info!(table_id = %table_id, order_id = %order_id, "Table released");
        }
        Ok(table)
    }

    /// Moves an open order from one table to another in one transaction,
    /// audited against the destination table.
    ///
    /// ## Errors
    /// - `TargetOccupied` if `to` holds a different active order
    /// - `Conflict` if the order is no longer at `from` (concurrent transfer)
    pub async fn transfer(
        &self,
        order_id: &str,
        from_table_id: &str,
        to_table_id: &str,
        user_id: &str,
    ) -> DbResult<TableTransfer> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        lock_order(&mut *tx, order_id).await?;
        let order = fetch_order_header(&mut *tx, order_id).await?;
        order.ensure_open()?;
        if order.table_id.as_deref() != Some(from_table_id) {
            return Err(DbError::Conflict(format!(
                "order {} is not at table {}",
                order_id, from_table_id
            )));
        }

        let from = fetch_table(&mut *tx, from_table_id).await?;
        let to = fetch_table(&mut *tx, to_table_id).await?;
        check_transfer(&from, &to, order_id)?;

        let (from, _) = release_in(&mut *tx, from_table_id, Some(order_id), now).await?;
        let to = assign_in(&mut *tx, to_table_id, order_id, now)
            .await
            .map_err(|err| match err {
                DbError::Domain(CoreError::TableOccupied { table_id, order_id }) => {
                    DbError::Domain(CoreError::TargetOccupied { table_id, order_id })
                }
                other => other,
            })?;
        set_order_table(&mut *tx, order_id, to_table_id, now).await?;
        audit::record(
            &mut *tx,
            user_id,
            "transferred",
            ENTITY_TABLE,
            to_table_id,
            json!({ "order_id": order_id, "from_table_id": from_table_id }),
        )
        .await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            from = %from_table_id,
            to = %to_table_id,
            "Order transferred"
        );
        Ok(TableTransfer { from, to })
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

pub(crate) async fn fetch_table(conn: &mut SqliteConnection, id: &str) -> DbResult<Table> {
    let sql = format!("SELECT {TABLE_COLUMNS} FROM dining_tables WHERE id = ?1");
    sqlx::query_as::<_, Table>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Table", id))
}

/// Marks `table_id` occupied by `order_id` with a conditional update.
pub(crate) async fn assign_in(
    conn: &mut SqliteConnection,
    table_id: &str,
    order_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Table> {
    let table = fetch_table(&mut *conn, table_id).await?;
    table.check_assignable(order_id)?;

    let result = sqlx::query(
        r#"
        UPDATE dining_tables
        SET status = 'occupied', current_order_id = ?2, updated_at = ?3
        WHERE id = ?1
          AND (current_order_id IS NULL OR current_order_id = ?2)
          AND status NOT IN ('dirty', 'maintenance')
        "#,
    )
    .bind(table_id)
    .bind(order_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "table {} changed while assigning order {}",
            table_id, order_id
        )));
    }

    fetch_table(&mut *conn, table_id).await
}

/// Frees a table.
///
/// With `holding = Some(order)` only frees it if it still holds that order and
/// fails with `Conflict` otherwise. With `None` it is an idempotent release.
/// Returns the table and the order it released, if any.
pub(crate) async fn release_in(
    conn: &mut SqliteConnection,
    table_id: &str,
    holding: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<(Table, Option<String>)> {
    let table = fetch_table(&mut *conn, table_id).await?;
    let Some(current) = table.current_order_id.clone() else {
        return match holding {
            Some(order_id) => Err(DbError::Conflict(format!(
                "table {} does not hold order {}",
                table_id, order_id
            ))),
            None => Ok((table, None)),
        };
    };

    let result = sqlx::query(
        r#"
        UPDATE dining_tables
        SET status = 'available', current_order_id = NULL, updated_at = ?3
        WHERE id = ?1 AND current_order_id = ?2
        "#,
    )
    .bind(table_id)
    .bind(holding.unwrap_or(&current))
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "table {} changed while releasing",
            table_id
        )));
    }

    let table = fetch_table(&mut *conn, table_id).await?;
    Ok((table, Some(current)))
}

/// Frees whatever table holds `order_id`. Used when an order turns terminal.
pub(crate) async fn release_order_table(
    conn: &mut SqliteConnection,
    table_id: &str,
    order_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Option<Table>> {
    let result = sqlx::query(
        r#"
        UPDATE dining_tables
        SET status = 'available', current_order_id = NULL, updated_at = ?3
        WHERE id = ?1 AND current_order_id = ?2
        "#,
    )
    .bind(table_id)
    .bind(order_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // Released manually earlier; nothing to do.
        return Ok(None);
    }
    Ok(Some(fetch_table(&mut *conn, table_id).await?))
}

async fn set_order_table(
    conn: &mut SqliteConnection,
    order_id: &str,
    table_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE orders SET table_id = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(order_id)
        .bind(table_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
