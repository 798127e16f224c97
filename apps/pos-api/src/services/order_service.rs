//! # Order Lifecycle Engine
//!
//! The operations the routes expose. Each one runs a single store
//! transaction and, once it has committed, publishes the resulting events to
//! the hub and queues any outbound messages.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  route handler ──► OrderEngine::op(..)                                  │
//! │                        │                                                │
//! │                        ├── 1. bistro-db: BEGIN … COMMIT                 │
//! │                        │      error → returned, nothing published       │
//! │                        │                                                │
//! │                        ├── 2. hub.publish(event)  (never awaits a       │
//! │                        │      client, never fails the request)          │
//! │                        │                                                │
//! │                        └── 3. outbound.queue_receipt() on completion    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Events
//! | operation          | event                                  | rooms                  |
//! |--------------------|----------------------------------------|------------------------|
//! | create             | `order`/`created` + `kitchen_order`    | all, kitchen           |
//! | transition         | `order_status`                         | all (+ by status)      |
//! | item status change | `item_status`                          | kitchen                |
//! | item / discount    | `order`/`item_*`, `discount_applied`   | kitchen, pos, waiters  |
//! | payment            | `payment`                              | pos (+ managers)       |
//! | table change       | `table_status`                         | pos, tables            |

use std::sync::Arc;

use bistro_core::{
    ItemChanges, ItemRequest, Money, NotificationEvent, Order, OrderDetails, OrderStatus,
    Payment, PricingRates, Table, TableStatus,
};
use bistro_db::{Database, NewTable, OrderFilter, PaymentRequest, TableTransfer};
use bistro_hub::Hub;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::services::outbound::OutboundQueue;

/// Order and table operations with their notifications.
#[derive(Clone)]
pub struct OrderEngine {
    db: Database,
    hub: Arc<Hub>,
    rates: PricingRates,
    outbound: OutboundQueue,
}

impl OrderEngine {
    pub fn new(db: Database, hub: Arc<Hub>, rates: PricingRates, outbound: OutboundQueue) -> Self {
        OrderEngine {
            db,
            hub,
            rates,
            outbound,
        }
    }

    async fn publish(&self, event: NotificationEvent) {
        let delivered = self.hub.publish(&event).await;
        debug!(
            kind = ?event.kind,
            action = %event.action,
            delivered,
            "Event published"
        );
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Opens an order, seats it if a table is given, and tickets the kitchen.
    pub async fn create_order(
        &self,
        user_id: &str,
        details: OrderDetails,
        items: &[ItemRequest],
    ) -> ApiResult<Order> {
        let created = self.db.orders().create(user_id, details, items, self.rates).await?;
        let now = Utc::now();

        self.publish(NotificationEvent::order_created(&created.order, user_id, now))
            .await;
        self.publish(NotificationEvent::kitchen_ticket(&created.order, now))
            .await;
        if let Some(table) = &created.table {
            self.publish(NotificationEvent::table_status(table, "occupied", now))
                .await;
        }
        Ok(created.order)
    }

    pub async fn get_order(&self, order_id: &str) -> ApiResult<Order> {
        Ok(self.db.orders().get(order_id).await?)
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>> {
        Ok(self.db.orders().list(filter).await?)
    }

    /// Moves an order through the state machine.
    ///
    /// Terminal statuses free the table; completion also queues a receipt.
    pub async fn transition(
        &self,
        order_id: &str,
        next: OrderStatus,
        user_id: &str,
    ) -> ApiResult<Order> {
        let change = self.db.orders().transition(order_id, next, user_id).await?;
        let now = Utc::now();
        let order = change.order;

        self.publish(NotificationEvent::order_status(
            &order,
            change.transition.from,
            change.transition.to,
            user_id,
            now,
        ))
        .await;
        if let Some(table) = &change.released_table {
            self.publish(NotificationEvent::table_status(table, "released", now))
                .await;
        }
        if order.status == OrderStatus::Completed && self.outbound.queue_receipt(&order) {
            info!(order_number = %order.order_number, "Receipt queued");
        }
        Ok(order)
    }

    pub async fn add_item(
        &self,
        order_id: &str,
        request: &ItemRequest,
        user_id: &str,
    ) -> ApiResult<Order> {
        let (order, _item) = self
            .db
            .orders()
            .add_item(order_id, request, self.rates)
            .await?;
        self.publish(NotificationEvent::order_updated(
            &order,
            "item_added",
            user_id,
            Utc::now(),
        ))
        .await;
        Ok(order)
    }

    /// Partial line update. A status change goes to the kitchen as
    /// `item_status`; other changes go out as `order`/`item_updated`.
    pub async fn update_item(
        &self,
        order_id: &str,
        item_id: &str,
        changes: &ItemChanges,
        user_id: &str,
    ) -> ApiResult<Order> {
        let (order, update) = self
            .db
            .orders()
            .update_item(order_id, item_id, changes, self.rates)
            .await?;
        let now = Utc::now();

        if let Some((from, to)) = update.status_change {
            self.publish(NotificationEvent::item_status(
                &order,
                &update.item,
                from,
                to,
                user_id,
                now,
            ))
            .await;
        }
        if update.repriced || changes.notes.is_some() {
            self.publish(NotificationEvent::order_updated(
                &order,
                "item_updated",
                user_id,
                now,
            ))
            .await;
        }
        Ok(order)
    }

    pub async fn remove_item(&self, order_id: &str, item_id: &str, user_id: &str) -> ApiResult<Order> {
        let (order, removed) = self
            .db
            .orders()
            .remove_item(order_id, item_id, self.rates)
            .await?;
        debug!(order_id = %order_id, item = %removed.menu_item_name, "Line removed");
        self.publish(NotificationEvent::order_updated(
            &order,
            "item_removed",
            user_id,
            Utc::now(),
        ))
        .await;
        Ok(order)
    }

    pub async fn apply_discount(
        &self,
        order_id: &str,
        discount: Money,
        user_id: &str,
    ) -> ApiResult<Order> {
        let order = self
            .db
            .orders()
            .apply_discount(order_id, discount, self.rates, user_id)
            .await?;
        self.publish(NotificationEvent::order_updated(
            &order,
            "discount_applied",
            user_id,
            Utc::now(),
        ))
        .await;
        Ok(order)
    }

    pub async fn record_payment(
        &self,
        order_id: &str,
        request: &PaymentRequest,
        user_id: &str,
    ) -> ApiResult<(Order, Payment)> {
        let (order, payment) = self
            .db
            .orders()
            .record_payment(order_id, request, user_id)
            .await?;
        self.publish(NotificationEvent::payment(&order, &payment, Utc::now()))
            .await;
        Ok((order, payment))
    }

    pub async fn payments(&self, order_id: &str) -> ApiResult<Vec<Payment>> {
        Ok(self.db.orders().payments(order_id).await?)
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub async fn create_table(&self, input: &NewTable) -> ApiResult<Table> {
        let table = self.db.tables().create(input).await?;
        self.publish(NotificationEvent::table_status(&table, "created", Utc::now()))
            .await;
        Ok(table)
    }

    pub async fn get_table(&self, table_id: &str) -> ApiResult<Table> {
        Ok(self.db.tables().get(table_id).await?)
    }

    pub async fn list_tables(&self, status: Option<TableStatus>) -> ApiResult<Vec<Table>> {
        Ok(self.db.tables().list(status).await?)
    }

    pub async fn set_table_status(&self, table_id: &str, status: TableStatus) -> ApiResult<Table> {
        let table = self.db.tables().set_status(table_id, status).await?;
        self.publish(NotificationEvent::table_status(
            &table,
            "status_changed",
            Utc::now(),
        ))
        .await;
        Ok(table)
    }

    pub async fn assign_table(&self, table_id: &str, order_id: &str) -> ApiResult<Table> {
        let table = self.db.tables().assign(table_id, order_id).await?;
        self.publish(NotificationEvent::table_status(&table, "occupied", Utc::now()))
            .await;
        Ok(table)
    }

    pub async fn release_table(&self, table_id: &str) -> ApiResult<Table> {
        let table = self.db.tables().release(table_id).await?;
        self.publish(NotificationEvent::table_status(&table, "released", Utc::now()))
            .await;
        Ok(table)
    }

    /// Moves an order between tables atomically.
    pub async fn transfer_table(
        &self,
        order_id: &str,
        from_table_id: &str,
        to_table_id: &str,
        user_id: &str,
    ) -> ApiResult<TableTransfer> {
        let transfer = self
            .db
            .tables()
            .transfer(order_id, from_table_id, to_table_id, user_id)
            .await?;
        let now = Utc::now();
        self.publish(NotificationEvent::table_status(&transfer.from, "released", now))
            .await;
        self.publish(NotificationEvent::table_status(&transfer.to, "occupied", now))
            .await;
        Ok(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bistro_core::{EventKind, ItemStatus, PaymentMethod, PaymentStatus, Role, Room};
    use bistro_db::{DbConfig, NewMenuItem};
    use bistro_hub::{ConnectionInfo, Frame, HubSettings};
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::error::ApiError;
    use crate::services::outbound::OutboundMessage;

    struct Fixture {
        engine: OrderEngine,
        db: Database,
        hub: Arc<Hub>,
        receipts: mpsc::Receiver<OutboundMessage>,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let hub = Arc::new(Hub::new(HubSettings::default()));
        let (outbound, receipts) = OutboundQueue::new(8, "Bistro");
        let engine = OrderEngine::new(db.clone(), hub.clone(), PricingRates::default(), outbound);
        Fixture {
            engine,
            db,
            hub,
            receipts,
        }
    }

    async fn menu_item(db: &Database, name: &str, price_cents: i64) -> String {
        db.menu()
            .create(&NewMenuItem {
                name: name.into(),
                description: None,
                category: Some("mains".into()),
                price_cents,
                preparation_minutes: Some(10),
            })
            .await
            .unwrap()
            .id
    }

    async fn table(db: &Database, number: i64) -> Table {
        db.tables()
            .create(&NewTable {
                number,
                name: None,
                section: None,
                capacity: 4,
            })
            .await
            .unwrap()
    }

    async fn observer(hub: &Hub, rooms: &[Room]) -> mpsc::Receiver<Frame> {
        let info = ConnectionInfo {
            user_id: "screen".into(),
            role: Role::Staff,
        };
        hub.connect(info, rooms.iter().copied()).await.1
    }

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    fn request(menu_item_id: &str, quantity: i64) -> ItemRequest {
        ItemRequest {
            menu_item_id: menu_item_id.to_string(),
            quantity,
            modifier_ids: vec![],
            notes: None,
        }
    }

    async fn seated_order(f: &Fixture, table_id: &str) -> Order {
        let burger = menu_item(&f.db, "Burger", 1000).await;
        let fries = menu_item(&f.db, "Fries", 500).await;
        let details = OrderDetails {
            table_id: Some(table_id.to_string()),
            ..Default::default()
        };
        f.engine
            .create_order(
                "waiter-1",
                details,
                &[request(&burger, 2), request(&fries, 1)],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_publishes_ticket_and_order() {
        let f = fixture().await;
        let mut kitchen = observer(&f.hub, &[Room::Kitchen]).await;
        let mut cashier = observer(&f.hub, &[Room::Pos]).await;
        let t1 = table(&f.db, 1).await;

        let order = seated_order(&f, &t1.id).await;

        let kitchen_events = drain(&mut kitchen);
        let kinds: Vec<&str> = kitchen_events
            .iter()
            .map(|e| e["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["order", "kitchen_order"]);
        assert_eq!(kitchen_events[1]["sound"], "new_order.mp3");
        assert_eq!(kitchen_events[1]["data"]["items"].as_array().unwrap().len(), 2);

        let pos_events = drain(&mut cashier);
        let kinds: Vec<&str> = pos_events
            .iter()
            .map(|e| e["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["order", "table_status"]);
        assert_eq!(pos_events[1]["table_id"], t1.id.as_str());
        assert_eq!(pos_events[1]["order_id"], order.id.as_str());
    }

    #[tokio::test]
    async fn test_end_to_end_completion() {
        let mut f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let mut pos = observer(&f.hub, &[Room::Pos]).await;
        let mut tables = observer(&f.hub, &[Room::Tables]).await;

        let order = seated_order(&f, &t1.id).await;
        assert_eq!(order.subtotal_cents, 2500);
        assert_eq!(order.tax_cents, 350);
        assert_eq!(order.service_charge_cents, 250);
        assert_eq!(order.total_cents, 3100);
        drain(&mut pos);
        drain(&mut tables);

        let done = f
            .engine
            .transition(&order.id, OrderStatus::Completed, "cashier-1")
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(done.payment_status, PaymentStatus::Paid);
        assert!(done.completed_at.is_some());

        let released = f.engine.get_table(&t1.id).await.unwrap();
        assert_eq!(released.status, TableStatus::Available);
        assert!(released.current_order_id.is_none());

        let trail = f.db.audit().for_entity("order", &order.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "status_changed");
        assert_eq!(trail[0].user_id, "cashier-1");

        for rx in [&mut pos, &mut tables] {
            let events = drain(rx);
            let status = events
                .iter()
                .find(|e| e["type"] == "order_status")
                .expect("order_status event");
            assert_eq!(status["data"]["status"], "completed");
            assert_eq!(status["user_id"], "cashier-1");
            assert!(events
                .iter()
                .any(|e| e["type"] == "table_status" && e["action"] == "released"));
        }

        // No phone on this order.
        assert!(f.receipts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_from_pending() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let mut everyone = observer(&f.hub, &[]).await;
        let order = seated_order(&f, &t1.id).await;
        drain(&mut everyone);

        let cancelled = f
            .engine
            .transition(&order.id, OrderStatus::Cancelled, "manager-1")
            .await
            .unwrap();
        assert!(cancelled.cancelled_at.is_some());
        assert!(cancelled.completed_at.is_none());
        assert!(f.engine.get_table(&t1.id).await.unwrap().current_order_id.is_none());

        let events = drain(&mut everyone);
        let status = events
            .iter()
            .find(|e| e["type"] == "order_status")
            .unwrap();
        assert!(status["rooms"]
            .as_array()
            .unwrap()
            .contains(&Value::from("all")));
    }

    #[tokio::test]
    async fn test_invalid_transition_publishes_nothing() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let order = seated_order(&f, &t1.id).await;
        f.engine
            .transition(&order.id, OrderStatus::Completed, "c")
            .await
            .unwrap();

        let mut everyone = observer(&f.hub, &[]).await;
        let err = f
            .engine
            .transition(&order.id, OrderStatus::Preparing, "c")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
        assert!(drain(&mut everyone).is_empty());
        assert_eq!(
            f.engine.get_order(&order.id).await.unwrap().status,
            OrderStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_completion_queues_receipt() {
        let mut f = fixture().await;
        let burger = menu_item(&f.db, "Burger", 1000).await;
        let mut details = OrderDetails::default();
        details.customer.phone = Some("+201234567".into());
        let order = f
            .engine
            .create_order("cashier-1", details, &[request(&burger, 1)])
            .await
            .unwrap();

        f.engine
            .transition(&order.id, OrderStatus::Completed, "cashier-1")
            .await
            .unwrap();

        let receipt = f.receipts.try_recv().unwrap();
        assert_eq!(receipt.to, "+201234567");
        assert_eq!(receipt.reference, order.order_number);
        assert!(receipt.body.contains("*Total: 12.40*"));
    }

    #[tokio::test]
    async fn test_item_status_goes_to_kitchen_only() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let order = seated_order(&f, &t1.id).await;
        let mut kitchen = observer(&f.hub, &[Room::Kitchen]).await;
        let mut pos = observer(&f.hub, &[Room::Pos]).await;

        let changes = ItemChanges {
            status: Some(ItemStatus::Preparing),
            ..Default::default()
        };
        f.engine
            .update_item(&order.id, &order.items[0].id, &changes, "chef-1")
            .await
            .unwrap();

        let events = drain(&mut kitchen);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "item_status");
        assert_eq!(events[0]["item_id"], order.items[0].id.as_str());
        assert_eq!(events[0]["data"]["status"], "preparing");
        assert!(drain(&mut pos).is_empty());
    }

    #[tokio::test]
    async fn test_item_changes_recalculate_and_notify() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let order = seated_order(&f, &t1.id).await;
        let mut waiters = observer(&f.hub, &[Room::Waiters]).await;

        let changes = ItemChanges {
            quantity: Some(1),
            ..Default::default()
        };
        let order = f
            .engine
            .update_item(&order.id, &order.items[0].id, &changes, "waiter-1")
            .await
            .unwrap();
        assert_eq!(order.subtotal_cents, 1500);

        let order = f
            .engine
            .remove_item(&order.id, &order.items[1].id, "waiter-1")
            .await
            .unwrap();
        assert_eq!(order.subtotal_cents, 1000);

        let actions: Vec<String> = drain(&mut waiters)
            .iter()
            .map(|e| e["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(actions, vec!["item_updated", "item_removed"]);
    }

    #[tokio::test]
    async fn test_payment_event() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let order = seated_order(&f, &t1.id).await;
        let mut pos = observer(&f.hub, &[Room::Pos]).await;
        let mut managers = observer(&f.hub, &[Room::Managers]).await;

        let (order, payment) = f
            .engine
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
        assert_eq!(order.remaining_cents, 2100);

        let events = drain(&mut pos);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "payment");
        // 10.00 is below the manager threshold.
        assert!(drain(&mut managers).is_empty());
        assert_eq!(f.engine.payments(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_publishes_both_tables() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let t2 = table(&f.db, 2).await;
        let order = seated_order(&f, &t1.id).await;
        let mut tables = observer(&f.hub, &[Room::Tables]).await;

        let transfer = f
            .engine
            .transfer_table(&order.id, &t1.id, &t2.id, "host-1")
            .await
            .unwrap();
        assert!(transfer.from.current_order_id.is_none());
        assert_eq!(transfer.to.current_order_id.as_deref(), Some(order.id.as_str()));

        let trail = f.db.audit().for_entity("table", &t2.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].user_id, "host-1");

        let events = drain(&mut tables);
        let actions: Vec<(&str, &str)> = events
            .iter()
            .map(|e| {
                (
                    e["table_id"].as_str().unwrap(),
                    e["action"].as_str().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            actions,
            vec![(t1.id.as_str(), "released"), (t2.id.as_str(), "occupied")]
        );
    }

    #[tokio::test]
    async fn test_transfer_to_occupied_is_rejected() {
        let f = fixture().await;
        let t1 = table(&f.db, 1).await;
        let t2 = table(&f.db, 2).await;
        let first = seated_order(&f, &t1.id).await;
        let _second = seated_order(&f, &t2.id).await;

        let err = f
            .engine
            .transfer_table(&first.id, &t1.id, &t2.id, "host-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { code: "target_occupied", .. }));
        assert_eq!(
            f.engine.get_table(&t1.id).await.unwrap().current_order_id.as_deref(),
            Some(first.id.as_str())
        );
    }

    #[tokio::test]
    async fn test_events_carry_kind() {
        let f = fixture().await;
        let mut all = observer(&f.hub, &[]).await;
        let burger = menu_item(&f.db, "Burger", 1000).await;
        f.engine
            .create_order("c", OrderDetails::default(), &[request(&burger, 1)])
            .await
            .unwrap();

        let events = drain(&mut all);
        let created: bistro_core::NotificationEvent =
            serde_json::from_value(events[0].clone()).unwrap();
        assert_eq!(created.kind, EventKind::Order);
        assert_eq!(created.action, "created");
    }
}
