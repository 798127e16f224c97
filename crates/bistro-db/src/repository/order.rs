//! # Order Repository
//!
//! Transactional store for the Order Aggregate: orders, lines, payments and
//! the lifecycle transitions that free tables.
//!
//! ## Mutation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Order Mutation                                │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── lock_order()      UPDATE orders SET version = version + 1         │
//! │   ├── load_order()      header + lines, read under the write lock       │
//! │   ├── Order::xxx()      bistro-core validates and mutates in memory     │
//! │   │      └── Err → ROLLBACK (dropped tx), nothing written               │
//! │   ├── write lines / payment / table release                             │
//! │   └── save_order()      header with recalculated totals                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Callers publish notification events only after this returns Ok.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, ENTITY_ORDER};
use crate::repository::menu::{fetch_menu_item, fetch_options};
use crate::repository::table::{assign_in, fetch_table, release_order_table};
use bistro_core::lifecycle::Transition;
use bistro_core::order::{format_order_number, ItemUpdate, SelectedModifier};
use bistro_core::validation::{validate_notes, validate_page, validate_seating};
use bistro_core::{
    CoreError, ItemChanges, ItemRequest, ItemStatus, Money, Order, OrderDetails, OrderItem,
    OrderStatus, Payment, PaymentMethod, PricingRates, Table,
};

const ORDER_COLUMNS: &str = "id, order_number, table_id, user_id, order_type, priority, status, \
     customer_name, customer_phone, customer_address, \
     subtotal_cents, tax_cents, service_charge_cents, discount_cents, total_cents, \
     paid_cents, remaining_cents, payment_status, notes, kitchen_notes, version, \
     created_at, updated_at, started_at, completed_at, cancelled_at";

const ITEM_COLUMNS: &str = "id, order_id, menu_item_id, menu_item_name, unit_price_cents, \
     quantity, modifiers, status, notes, position, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, method, amount_cents, tendered_cents, \
     change_cents, reference, received_by, created_at";

// =============================================================================
// Inputs / Outcomes
// =============================================================================

/// Filters for [`OrderRepository::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// A created order and the table it was seated at.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: Order,
    pub table: Option<Table>,
}

/// A committed status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order: Order,
    pub transition: Transition,
    /// Set when the transition freed a table.
    pub released_table: Option<Table>,
}

/// A cash/card/wallet payment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    #[serde(default)]
    pub tendered_cents: Option<i64>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Row shape of `order_items`; modifiers are stored as JSON.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    menu_item_id: String,
    menu_item_name: String,
    unit_price_cents: i64,
    quantity: i64,
    modifiers: String,
    status: ItemStatus,
    notes: Option<String>,
    position: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = DbError;

    fn try_from(row: OrderItemRow) -> DbResult<Self> {
        let modifiers: Vec<SelectedModifier> = serde_json::from_str(&row.modifiers)?;
        Ok(OrderItem {
            id: row.id,
            order_id: row.order_id,
            menu_item_id: row.menu_item_id,
            menu_item_name: row.menu_item_name,
            unit_price_cents: row.unit_price_cents,
            quantity: row.quantity,
            modifiers,
            status: row.status,
            notes: row.notes,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Opens an order with its initial lines, seating it if a table is given.
    ///
    /// ## Errors
    /// - `Validation` for a table on a takeaway, delivery or online order
    /// - `InvalidItem` for an unknown menu item or modifier
    /// - `InvalidQuantity`, `ItemUnavailable` as in `Order::add_item`
    /// - `TableOccupied` / `TableUnavailable` for the requested table
    pub async fn create(
        &self,
        user_id: &str,
        details: OrderDetails,
        items: &[ItemRequest],
        rates: PricingRates,
    ) -> DbResult<CreatedOrder> {
        if let Some(notes) = &details.notes {
            validate_notes(notes).map_err(CoreError::from)?;
        }
        if let Some(notes) = &details.kitchen_notes {
            validate_notes(notes).map_err(CoreError::from)?;
        }
        validate_seating(details.order_type, details.table_id.as_deref())
            .map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // First statement writes: takes the lock for the whole creation.
        let sequence = next_order_number(&mut *tx, now.date_naive()).await?;
        let mut order = Order::open(
            format_order_number(now.date_naive(), sequence),
            user_id,
            details,
            now,
        );

        for request in items {
            let menu_item = fetch_menu_item(&mut *tx, &request.menu_item_id)
                .await?
                .ok_or_else(|| {
                    CoreError::InvalidItem(format!("unknown menu item {}", request.menu_item_id))
                })?;
            let options = fetch_options(&mut *tx, &menu_item.id).await?;
            order.add_item(&menu_item, &options, request, rates, now)?;
        }

        if let Some(table_id) = &order.table_id {
            fetch_table(&mut *tx, table_id).await?.check_assignable(&order.id)?;
        }

        insert_order(&mut *tx, &order).await?;
        for item in &order.items {
            insert_item(&mut *tx, item).await?;
        }

        let table = match order.table_id.clone() {
            Some(table_id) => Some(assign_in(&mut *tx, &table_id, &order.id, now).await?),
            None => None,
        };

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = order.items.len(),
            total_cents = order.total_cents,
            "Order created"
        );
        Ok(CreatedOrder { order, table })
    }

    /// Gets an order with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Order> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut *conn, id).await
    }

    /// Lists orders, newest first, with their lines.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let (limit, offset) = validate_page(filter.page, filter.limit).map_err(CoreError::from)?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR table_id = ?2) \
             ORDER BY created_at DESC, order_number DESC \
             LIMIT ?3 OFFSET ?4"
        );

        let mut conn = self.pool.acquire().await?;
        let mut orders = sqlx::query_as::<_, Order>(&sql)
            .bind(filter.status)
            .bind(&filter.table_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        for order in &mut orders {
            order.items = fetch_items(&mut *conn, &order.id).await?;
        }
        Ok(orders)
    }

    /// Moves an order to `next`, releasing its table on terminal statuses.
    /// The change is audited under `user_id`.
    ///
    /// ## Errors
    /// - `NotFound` if the order doesn't exist
    /// - `InvalidTransition` for backward, same or post-terminal moves
    pub async fn transition(
        &self,
        order_id: &str,
        next: OrderStatus,
        user_id: &str,
    ) -> DbResult<StatusChange> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        lock_order(&mut *tx, order_id).await?;
        let mut order = load_order(&mut *tx, order_id).await?;
        let transition = order.transition_to(next, now)?;

        let released_table = match &transition.release_table {
            Some(table_id) => release_order_table(&mut *tx, table_id, order_id, now).await?,
            None => None,
        };
        save_order(&mut *tx, &order).await?;
        audit::record(
            &mut *tx,
            user_id,
            "status_changed",
            ENTITY_ORDER,
            order_id,
            json!({
                "from": transition.from,
                "to": transition.to,
                "released_table": transition.release_table,
            }),
        )
        .await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            from = %transition.from,
            to = %transition.to,
            released_table = ?released_table.as_ref().map(|t| t.id.as_str()),
            "Order status changed"
        );
        Ok(StatusChange {
            order,
            transition,
            released_table,
        })
    }

    /// Appends a line to an open order.
    pub async fn add_item(
        &self,
        order_id: &str,
        request: &ItemRequest,
        rates: PricingRates,
    ) -> DbResult<(Order, OrderItem)> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        lock_order(&mut *tx, order_id).await?;
        let mut order = load_order(&mut *tx, order_id).await?;
        order.ensure_open()?;

        let menu_item = fetch_menu_item(&mut *tx, &request.menu_item_id)
            .await?
            .ok_or_else(|| DbError::not_found("MenuItem", &request.menu_item_id))?;
        let options = fetch_options(&mut *tx, &menu_item.id).await?;
        let item = order.add_item(&menu_item, &options, request, rates, now)?;

        insert_item(&mut *tx, &item).await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        debug!(order_id = %order_id, item_id = %item.id, "Item added");
        Ok((order, item))
    }

    /// Applies a partial update to a line.
    pub async fn update_item(
        &self,
        order_id: &str,
        item_id: &str,
        changes: &ItemChanges,
        rates: PricingRates,
    ) -> DbResult<(Order, ItemUpdate)> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        lock_order(&mut *tx, order_id).await?;
        let mut order = load_order(&mut *tx, order_id).await?;

        let options = match (&changes.modifier_ids, order.item(item_id)) {
            (Some(_), Some(item)) => fetch_options(&mut *tx, &item.menu_item_id).await?,
            _ => Vec::new(),
        };
        let update = order.update_item(item_id, changes, &options, rates, now)?;

        update_item_row(&mut *tx, &update.item).await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        debug!(
            order_id = %order_id,
            item_id = %item_id,
            repriced = update.repriced,
            "Item updated"
        );
        Ok((order, update))
    }

    /// Removes a line from an open order.
    pub async fn remove_item(
        &self,
        order_id: &str,
        item_id: &str,
        rates: PricingRates,
    ) -> DbResult<(Order, OrderItem)> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        lock_order(&mut *tx, order_id).await?;
        let mut order = load_order(&mut *tx, order_id).await?;
        let removed = order.remove_item(item_id, rates, now)?;

        sqlx::query("DELETE FROM order_items WHERE id = ?1 AND order_id = ?2")
            .bind(&removed.id)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        debug!(order_id = %order_id, item_id = %item_id, "Item removed");
        Ok((order, removed))
    }

    /// Sets the order discount and recalculates.
    pub async fn apply_discount(
        &self,
        order_id: &str,
        discount: Money,
        rates: PricingRates,
        user_id: &str,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        lock_order(&mut *tx, order_id).await?;
        let mut order = load_order(&mut *tx, order_id).await?;
        let previous = order.discount_cents;
        order.apply_discount(discount, rates, Utc::now())?;

        save_order(&mut *tx, &order).await?;
        audit::record(
            &mut *tx,
            user_id,
            "discount_applied",
            ENTITY_ORDER,
            order_id,
            json!({
                "previous_cents": previous,
                "discount_cents": order.discount_cents,
                "total_cents": order.total_cents,
            }),
        )
        .await?;
        tx.commit().await?;

        debug!(order_id = %order_id, discount_cents = discount.cents(), "Discount applied");
        Ok(order)
    }

    /// Records a payment against the remaining balance, audited under
    /// `received_by`.
    pub async fn record_payment(
        &self,
        order_id: &str,
        request: &PaymentRequest,
        received_by: &str,
    ) -> DbResult<(Order, Payment)> {
        let mut tx = self.pool.begin().await?;

        lock_order(&mut *tx, order_id).await?;
        let mut order = load_order(&mut *tx, order_id).await?;
        let payment = order.record_payment(
            request.method,
            Money::from_cents(request.amount_cents),
            request.tendered_cents.map(Money::from_cents),
            request.reference.clone(),
            received_by,
            Utc::now(),
        )?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, method, amount_cents, tendered_cents,
                change_cents, reference, received_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.tendered_cents)
        .bind(payment.change_cents)
        .bind(&payment.reference)
        .bind(&payment.received_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        save_order(&mut *tx, &order).await?;
        audit::record(
            &mut *tx,
            received_by,
            "payment_recorded",
            ENTITY_ORDER,
            order_id,
            json!({
                "payment_id": payment.id,
                "method": payment.method,
                "amount_cents": payment.amount_cents,
                "payment_status": order.payment_status,
            }),
        )
        .await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            amount_cents = payment.amount_cents,
            payment_status = ?order.payment_status,
            "Payment recorded"
        );
        Ok((order, payment))
    }

    /// Payments of an order, oldest first.
    pub async fn payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_header(&mut *conn, order_id).await?;

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ?1 ORDER BY created_at"
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(payments)
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Bumps the order version. As the first write of a transaction this takes
/// the store's write lock, so every later read sees the latest committed row.
pub(crate) async fn lock_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    let result = sqlx::query("UPDATE orders SET version = version + 1 WHERE id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", order_id));
    }
    Ok(())
}

/// The order row without its lines.
pub(crate) async fn fetch_order_header(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Order> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    sqlx::query_as::<_, Order>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))
}

async fn load_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    let mut order = fetch_order_header(&mut *conn, order_id).await?;
    order.items = fetch_items(&mut *conn, order_id).await?;
    Ok(order)
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY position");
    let rows = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(OrderItem::try_from).collect()
}

/// Allocates the next number of `day`'s sequence.
async fn next_order_number(conn: &mut SqliteConnection, day: NaiveDate) -> DbResult<i64> {
    let last: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO order_sequences (day, last) VALUES (?1, 1)
        ON CONFLICT(day) DO UPDATE SET last = last + 1
        RETURNING last
        "#,
    )
    .bind(day.format("%Y%m%d").to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(last)
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, table_id, user_id, order_type, priority, status,
            customer_name, customer_phone, customer_address,
            subtotal_cents, tax_cents, service_charge_cents, discount_cents, total_cents,
            paid_cents, remaining_cents, payment_status, notes, kitchen_notes, version,
            created_at, updated_at, started_at, completed_at, cancelled_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20, ?21,
            ?22, ?23, ?24, ?25, ?26
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(&order.table_id)
    .bind(&order.user_id)
    .bind(order.order_type)
    .bind(order.priority)
    .bind(order.status)
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(&order.customer_address)
    .bind(order.subtotal_cents)
    .bind(order.tax_cents)
    .bind(order.service_charge_cents)
    .bind(order.discount_cents)
    .bind(order.total_cents)
    .bind(order.paid_cents)
    .bind(order.remaining_cents)
    .bind(order.payment_status)
    .bind(&order.notes)
    .bind(&order.kitchen_notes)
    .bind(order.version)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.started_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes the mutable header fields. The version was bumped by `lock_order`.
async fn save_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE orders SET
            status = ?2,
            subtotal_cents = ?3,
            tax_cents = ?4,
            service_charge_cents = ?5,
            discount_cents = ?6,
            total_cents = ?7,
            paid_cents = ?8,
            remaining_cents = ?9,
            payment_status = ?10,
            updated_at = ?11,
            started_at = ?12,
            completed_at = ?13,
            cancelled_at = ?14
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(order.status)
    .bind(order.subtotal_cents)
    .bind(order.tax_cents)
    .bind(order.service_charge_cents)
    .bind(order.discount_cents)
    .bind(order.total_cents)
    .bind(order.paid_cents)
    .bind(order.remaining_cents)
    .bind(order.payment_status)
    .bind(order.updated_at)
    .bind(order.started_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, menu_item_id, menu_item_name, unit_price_cents,
            quantity, modifiers, status, notes, position, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.menu_item_id)
    .bind(&item.menu_item_name)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(serde_json::to_string(&item.modifiers)?)
    .bind(item.status)
    .bind(&item.notes)
    .bind(item.position)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_item_row(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE order_items SET
            quantity = ?2, modifiers = ?3, status = ?4, notes = ?5, updated_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(&item.id)
    .bind(item.quantity)
    .bind(serde_json::to_string(&item.modifiers)?)
    .bind(item.status)
    .bind(&item.notes)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::menu::{NewMenuItem, NewModifierOption};
    use crate::repository::table::NewTable;
    use crate::{Database, DbConfig};
    use bistro_core::{OrderType, PaymentStatus, TableStatus};

    struct Fixture {
        db: Database,
        burger: String,
        fries: String,
        table: Table,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let menu = db.menu();
        let burger = menu
            .create(&NewMenuItem {
                name: "Burger".into(),
                description: None,
                category: Some("mains".into()),
                price_cents: 1000,
                preparation_minutes: Some(10),
            })
            .await
            .unwrap();
        let fries = menu
            .create(&NewMenuItem {
                name: "Fries".into(),
                description: None,
                category: Some("sides".into()),
                price_cents: 500,
                preparation_minutes: None,
            })
            .await
            .unwrap();
        let table = db
            .tables()
            .create(&NewTable {
                number: 7,
                name: None,
                section: None,
                capacity: 4,
            })
            .await
            .unwrap();
        Fixture {
            db,
            burger: burger.id,
            fries: fries.id,
            table,
        }
    }

    fn line(menu_item_id: &str, quantity: i64) -> ItemRequest {
        ItemRequest {
            menu_item_id: menu_item_id.to_string(),
            quantity,
            modifier_ids: vec![],
            notes: None,
        }
    }

    async fn seated_order(f: &Fixture) -> Order {
        let details = OrderDetails {
            table_id: Some(f.table.id.clone()),
            ..Default::default()
        };
        f.db.orders()
            .create(
                "waiter-1",
                details,
                &[line(&f.burger, 2), line(&f.fries, 1)],
                PricingRates::default(),
            )
            .await
            .unwrap()
            .order
    }

    #[tokio::test]
    async fn test_create_seats_order_and_computes_totals() {
        let f = fixture().await;
        let order = seated_order(&f).await;

        assert_eq!(order.subtotal_cents, 2500);
        assert_eq!(order.tax_cents, 350);
        assert_eq!(order.service_charge_cents, 250);
        assert_eq!(order.total_cents, 3100);
        assert!(order.order_number.starts_with("ORD-"));

        let stored = f.db.orders().get(&order.id).await.unwrap();
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].position, 1);
        assert_eq!(stored.total_cents, 3100);

        let table = f.db.tables().get(&f.table.id).await.unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_order_id.as_deref(), Some(order.id.as_str()));
    }

    #[tokio::test]
    async fn test_order_numbers_increase() {
        let f = fixture().await;
        let a = f
            .db
            .orders()
            .create("u", OrderDetails::default(), &[], PricingRates::default())
            .await
            .unwrap()
            .order;
        let b = f
            .db
            .orders()
            .create("u", OrderDetails::default(), &[], PricingRates::default())
            .await
            .unwrap()
            .order;
        assert!(a.order_number.ends_with("-0001"));
        assert!(b.order_number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_item_and_occupied_table() {
        let f = fixture().await;
        let err = f
            .db
            .orders()
            .create(
                "u",
                OrderDetails::default(),
                &[line("ghost", 1)],
                PricingRates::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidItem(_))));

        seated_order(&f).await;
        let details = OrderDetails {
            table_id: Some(f.table.id.clone()),
            ..Default::default()
        };
        let err = f
            .db
            .orders()
            .create("u", details, &[line(&f.burger, 1)], PricingRates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TableOccupied { .. })));

        // Only the first order exists.
        let all = f.db.orders().list(&OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_create_seats_only_dine_in_orders() {
        let f = fixture().await;
        for order_type in [OrderType::Takeaway, OrderType::Delivery, OrderType::Online] {
            let details = OrderDetails {
                order_type,
                table_id: Some(f.table.id.clone()),
                ..Default::default()
            };
            let err = f
                .db
                .orders()
                .create("u", details, &[line(&f.fries, 1)], PricingRates::default())
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        }

        let table = f.db.tables().get(&f.table.id).await.unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(f.db.orders().list(&OrderFilter::default()).await.unwrap().is_empty());

        let takeaway = f
            .db
            .orders()
            .create(
                "u",
                OrderDetails {
                    order_type: OrderType::Takeaway,
                    ..Default::default()
                },
                &[line(&f.fries, 1)],
                PricingRates::default(),
            )
            .await
            .unwrap();
        assert!(takeaway.table.is_none());
        assert!(takeaway.order.table_id.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_line_too_large_to_price() {
        let f = fixture().await;
        // Older rows may predate the price bound.
        sqlx::query("UPDATE menu_items SET price_cents = ?1 WHERE id = ?2")
            .bind(i64::MAX / 2)
            .bind(&f.burger)
            .execute(f.db.pool())
            .await
            .unwrap();

        let details = OrderDetails {
            table_id: Some(f.table.id.clone()),
            ..Default::default()
        };
        let err = f
            .db
            .orders()
            .create("u", details, &[line(&f.burger, 3)], PricingRates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        assert!(f.db.orders().list(&OrderFilter::default()).await.unwrap().is_empty());
        let table = f.db.tables().get(&f.table.id).await.unwrap();
        assert!(table.current_order_id.is_none());
    }

    #[tokio::test]
    async fn test_complete_releases_table_and_marks_paid() {
        let f = fixture().await;
        let order = seated_order(&f).await;

        let change = f
            .db
            .orders()
            .transition(&order.id, OrderStatus::Completed, "manager-1")
            .await
            .unwrap();

        assert_eq!(change.order.status, OrderStatus::Completed);
        assert_eq!(change.order.payment_status, PaymentStatus::Paid);
        assert_eq!(change.order.paid_cents, 3100);
        assert_eq!(change.order.remaining_cents, 0);
        assert!(change.order.completed_at.is_some());
        assert!(change.order.cancelled_at.is_none());
        let released = change.released_table.unwrap();
        assert_eq!(released.status, TableStatus::Available);

        let table = f.db.tables().get(&f.table.id).await.unwrap();
        assert!(table.current_order_id.is_none());
    }

    #[tokio::test]
    async fn test_cancel_pending_order() {
        let f = fixture().await;
        let order = seated_order(&f).await;

        let change = f
            .db
            .orders()
            .transition(&order.id, OrderStatus::Cancelled, "manager-1")
            .await
            .unwrap();
        assert_eq!(change.transition.from, OrderStatus::Pending);
        assert!(change.order.cancelled_at.is_some());
        assert!(change.order.completed_at.is_none());
        assert!(change.released_table.is_some());

        let stored = f.db.orders().get(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_order_untouched() {
        let f = fixture().await;
        let order = seated_order(&f).await;
        f.db.orders()
            .transition(&order.id, OrderStatus::Completed, "manager-1")
            .await
            .unwrap();

        let err = f
            .db
            .orders()
            .transition(&order.id, OrderStatus::Preparing, "manager-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        let stored = f.db.orders().get(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);

        assert!(matches!(
            f.db.orders().transition("ghost", OrderStatus::Ready, "manager-1").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_item_mutations() {
        let f = fixture().await;
        let order = seated_order(&f).await;
        let rates = PricingRates::default();

        let option = f
            .db
            .menu()
            .add_modifier(
                &f.burger,
                &NewModifierOption {
                    name: "Bacon".into(),
                    price_delta_cents: 200,
                    is_default: false,
                },
            )
            .await
            .unwrap();

        let mut request = line(&f.burger, 1);
        request.modifier_ids = vec![option.id.clone()];
        let (updated, item) = f.db.orders().add_item(&order.id, &request, rates).await.unwrap();
        assert_eq!(item.position, 3);
        assert_eq!(updated.subtotal_cents, 3700);

        let changes = ItemChanges {
            quantity: Some(2),
            ..Default::default()
        };
        let (updated, update) = f
            .db
            .orders()
            .update_item(&order.id, &item.id, &changes, rates)
            .await
            .unwrap();
        assert!(update.repriced);
        assert_eq!(updated.subtotal_cents, 4900);

        let stored = f.db.orders().get(&order.id).await.unwrap();
        assert_eq!(stored.item(&item.id).unwrap().modifiers.len(), 1);
        assert_eq!(stored.version, updated.version);

        let (updated, _) = f
            .db
            .orders()
            .remove_item(&order.id, &item.id, rates)
            .await
            .unwrap();
        assert_eq!(updated.subtotal_cents, 2500);
        assert!(matches!(
            f.db.orders().remove_item(&order.id, &item.id, rates).await,
            Err(DbError::Domain(CoreError::ItemNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_item_status_change() {
        let f = fixture().await;
        let order = seated_order(&f).await;
        let item_id = order.items[0].id.clone();

        let changes = ItemChanges {
            status: Some(ItemStatus::Preparing),
            ..Default::default()
        };
        let (_, update) = f
            .db
            .orders()
            .update_item(&order.id, &item_id, &changes, PricingRates::default())
            .await
            .unwrap();
        assert_eq!(
            update.status_change,
            Some((ItemStatus::Pending, ItemStatus::Preparing))
        );
        assert!(!update.repriced);
    }

    #[tokio::test]
    async fn test_closed_order_rejects_items() {
        let f = fixture().await;
        let order = seated_order(&f).await;
        f.db.orders()
            .transition(&order.id, OrderStatus::Cancelled, "manager-1")
            .await
            .unwrap();

        let err = f
            .db
            .orders()
            .add_item(&order.id, &line(&f.fries, 1), PricingRates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::OrderClosed { .. })));
    }

    #[tokio::test]
    async fn test_payments_and_discount() {
        let f = fixture().await;
        let order = seated_order(&f).await;
        let repo = f.db.orders();

        let order = repo
            .apply_discount(&order.id, Money::from_cents(100), PricingRates::default(), "manager-1")
            .await
            .unwrap();
        assert_eq!(order.total_cents, 3000);

        let (order, payment) = repo
            .record_payment(
                &order.id,
                &PaymentRequest {
                    method: PaymentMethod::Cash,
                    amount_cents: 1000,
                    tendered_cents: Some(2000),
                    reference: None,
                },
                "cashier-1",
            )
            .await
            .unwrap();
        assert_eq!(payment.change_cents, 1000);
        assert_eq!(order.payment_status, PaymentStatus::Partial);
        assert_eq!(order.remaining_cents, 2000);

        let err = repo
            .record_payment(
                &order.id,
                &PaymentRequest {
                    method: PaymentMethod::Card,
                    amount_cents: 2001,
                    tendered_cents: None,
                    reference: None,
                },
                "cashier-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidPaymentAmount { .. })));

        let payments = repo.payments(&order.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].tendered_cents, Some(2000));
    }

    #[tokio::test]
    async fn test_mutations_are_audited() {
        let f = fixture().await;
        let order = seated_order(&f).await;
        let repo = f.db.orders();

        repo.apply_discount(&order.id, Money::from_cents(200), PricingRates::default(), "manager-1")
            .await
            .unwrap();
        repo.record_payment(
            &order.id,
            &PaymentRequest {
                method: PaymentMethod::Card,
                amount_cents: 500,
                tendered_cents: None,
                reference: Some("auth-77".into()),
            },
            "cashier-1",
        )
        .await
        .unwrap();
        repo.transition(&order.id, OrderStatus::Cancelled, "manager-2")
            .await
            .unwrap();

        // Rejected changes leave no trace.
        assert!(repo
            .transition(&order.id, OrderStatus::Ready, "manager-2")
            .await
            .is_err());

        let trail = f.db.audit().for_entity(ENTITY_ORDER, &order.id).await.unwrap();
        let actions: Vec<_> = trail.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["discount_applied", "payment_recorded", "status_changed"]);

        assert_eq!(trail[0].user_id, "manager-1");
        assert_eq!(trail[0].details["previous_cents"], 0);
        assert_eq!(trail[0].details["discount_cents"], 200);
        assert_eq!(trail[1].user_id, "cashier-1");
        assert_eq!(trail[1].details["amount_cents"], 500);
        assert_eq!(trail[1].details["method"], "card");
        assert_eq!(trail[2].user_id, "manager-2");
        assert_eq!(trail[2].details["from"], "pending");
        assert_eq!(trail[2].details["to"], "cancelled");
        assert_eq!(trail[2].details["released_table"], f.table.id.as_str());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let f = fixture().await;
        let seated = seated_order(&f).await;
        let takeaway = f
            .db
            .orders()
            .create("u", OrderDetails::default(), &[line(&f.fries, 1)], PricingRates::default())
            .await
            .unwrap()
            .order;
        f.db.orders()
            .transition(&takeaway.id, OrderStatus::Confirmed, "manager-1")
            .await
            .unwrap();

        let repo = f.db.orders();
        let confirmed = repo
            .list(&OrderFilter {
                status: Some(OrderStatus::Confirmed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, takeaway.id);
        assert_eq!(confirmed[0].items.len(), 1);

        let at_table = repo
            .list(&OrderFilter {
                table_id: Some(f.table.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(at_table.len(), 1);
        assert_eq!(at_table[0].id, seated.id);

        let page = repo
            .list(&OrderFilter {
                page: Some(2),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
