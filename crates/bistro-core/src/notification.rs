//! # Notification Events
//!
//! Typed events produced by order and table mutations, and the routing rules
//! that decide which rooms receive them. The hub delivers; this module only
//! builds and addresses.
//!
//! ## Routing
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────────┐
//! │ event            │ rooms                                                │
//! ├──────────────────┼──────────────────────────────────────────────────────┤
//! │ order/created    │ all                                                  │
//! │ kitchen_order    │ kitchen (with sound hint)                            │
//! │ order/updated    │ kitchen, pos, waiters                                │
//! │ order_status     │ all  (+ kitchen, waiters on ready)                   │
//! │                  │      (+ pos, tables on completed / cancelled)        │
//! │ item_status      │ kitchen                                              │
//! │ table_status     │ pos, tables                                          │
//! │ payment          │ pos  (+ managers above 1000.00)                      │
//! └──────────────────┴──────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::order::{Order, OrderItem};
use crate::types::{ItemStatus, OrderStatus, Payment, Role, Table};

/// Payments above this amount (cents) are also sent to managers.
pub const LARGE_PAYMENT_CENTS: i64 = 100_000;

/// Sound the kitchen display plays for a new ticket.
pub const NEW_ORDER_SOUND: &str = "new_order.mp3";

// =============================================================================
// Room
// =============================================================================

/// A named broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Room {
    Kitchen,
    Pos,
    Waiters,
    Dashboard,
    Managers,
    Tables,
    Staff,
    Inventory,
    Customers,
    /// Every connection is implicitly a member.
    All,
}

impl Room {
    pub fn as_str(&self) -> &'static str {
        match self {
            Room::Kitchen => "kitchen",
            Room::Pos => "pos",
            Room::Waiters => "waiters",
            Room::Dashboard => "dashboard",
            Room::Managers => "managers",
            Room::Tables => "tables",
            Room::Staff => "staff",
            Room::Inventory => "inventory",
            Room::Customers => "customers",
            Room::All => "all",
        }
    }

    /// Rooms a fresh connection joins based on the user's role.
    pub fn defaults_for(role: Role) -> Vec<Room> {
        match role {
            Role::Kitchen => vec![Room::Kitchen],
            Role::Waiter => vec![Room::Waiters, Room::Tables],
            Role::Cashier => vec![Room::Pos],
            Role::Manager | Role::Admin | Role::SuperAdmin => vec![Room::Managers, Room::Dashboard],
            Role::Staff => vec![Room::Staff],
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Room {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "kitchen" => Room::Kitchen,
            "pos" => Room::Pos,
            "waiters" => Room::Waiters,
            "dashboard" => Room::Dashboard,
            "managers" => Room::Managers,
            "tables" => Room::Tables,
            "staff" => Room::Staff,
            "inventory" => Room::Inventory,
            "customers" => Room::Customers,
            "all" => Room::All,
            other => {
                return Err(ValidationError::InvalidFormat {
                    field: "room".to_string(),
                    reason: format!("unknown room '{}'", other),
                })
            }
        })
    }
}

// =============================================================================
// Event
// =============================================================================

/// Serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Order,
    OrderStatus,
    ItemStatus,
    KitchenOrder,
    TableStatus,
    Payment,
}

/// An ephemeral event handed to the hub once and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub action: String,
    pub rooms: Vec<Room>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sound: Option<String>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    fn new(kind: EventKind, action: &str, rooms: Vec<Room>, data: Value, now: DateTime<Utc>) -> Self {
        NotificationEvent {
            kind,
            action: action.to_string(),
            rooms,
            order_id: None,
            item_id: None,
            table_id: None,
            user_id: None,
            data,
            sound: None,
            timestamp: now,
        }
    }

    fn for_order(mut self, order: &Order) -> Self {
        self.order_id = Some(order.id.clone());
        self.table_id = order.table_id.clone();
        self
    }

    fn by(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// True when a member of `room` should receive this event.
    pub fn targets(&self, room: Room) -> bool {
        self.rooms.contains(&Room::All) || self.rooms.contains(&room)
    }

    /// `order`/`created`, to everyone.
    pub fn order_created(order: &Order, user_id: &str, now: DateTime<Utc>) -> Self {
        let data = json!({
            "order_number": order.order_number,
            "order_type": order.order_type,
            "status": order.status,
            "total_cents": order.total_cents,
            "items_count": order.items.len(),
        });
        Self::new(EventKind::Order, "created", vec![Room::All], data, now)
            .for_order(order)
            .by(user_id)
    }

    /// Ticket for the kitchen display, with the new-order sound.
    pub fn kitchen_ticket(order: &Order, now: DateTime<Utc>) -> Self {
        let items: Vec<Value> = order
            .items
            .iter()
            .filter(|item| !item.is_cancelled())
            .map(ticket_line)
            .collect();
        let data = json!({
            "order_number": order.order_number,
            "order_type": order.order_type,
            "priority": order.priority,
            "kitchen_notes": order.kitchen_notes,
            "items": items,
        });
        let mut event = Self::new(EventKind::KitchenOrder, "new", vec![Room::Kitchen], data, now)
            .for_order(order);
        event.sound = Some(NEW_ORDER_SOUND.to_string());
        event
    }

    /// Lines or discount changed (`action` says which).
    pub fn order_updated(order: &Order, action: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        let data = json!({
            "order_number": order.order_number,
            "totals": order.totals(),
            "items": order.items.iter().map(ticket_line).collect::<Vec<_>>(),
        });
        Self::new(
            EventKind::Order,
            action,
            vec![Room::Kitchen, Room::Pos, Room::Waiters],
            data,
            now,
        )
        .for_order(order)
        .by(user_id)
    }

    pub fn order_status(
        order: &Order,
        from: OrderStatus,
        to: OrderStatus,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let data = json!({
            "order_number": order.order_number,
            "from": from,
            "status": to,
            "payment_status": order.payment_status,
            "total_cents": order.total_cents,
        });
        Self::new(EventKind::OrderStatus, "updated", order_status_rooms(to), data, now)
            .for_order(order)
            .by(user_id)
    }

    pub fn item_status(
        order: &Order,
        item: &OrderItem,
        from: ItemStatus,
        to: ItemStatus,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let data = json!({
            "order_number": order.order_number,
            "menu_item_name": item.menu_item_name,
            "quantity": item.quantity,
            "from": from,
            "status": to,
        });
        let mut event = Self::new(EventKind::ItemStatus, "updated", vec![Room::Kitchen], data, now)
            .for_order(order)
            .by(user_id);
        event.item_id = Some(item.id.clone());
        event
    }

    pub fn table_status(table: &Table, action: &str, now: DateTime<Utc>) -> Self {
        let data = json!({
            "number": table.number,
            "status": table.status,
            "current_order_id": table.current_order_id,
        });
        let mut event = Self::new(
            EventKind::TableStatus,
            action,
            vec![Room::Pos, Room::Tables],
            data,
            now,
        );
        event.table_id = Some(table.id.clone());
        event.order_id = table.current_order_id.clone();
        event
    }

    pub fn payment(order: &Order, payment: &Payment, now: DateTime<Utc>) -> Self {
        let mut rooms = vec![Room::Pos];
        if payment.amount_cents > LARGE_PAYMENT_CENTS {
            rooms.push(Room::Managers);
        }
        let data = json!({
            "order_number": order.order_number,
            "payment_id": payment.id,
            "method": payment.method,
            "amount_cents": payment.amount_cents,
            "change_cents": payment.change_cents,
            "paid_cents": order.paid_cents,
            "remaining_cents": order.remaining_cents,
            "payment_status": order.payment_status,
        });
        Self::new(EventKind::Payment, "received", rooms, data, now)
            .for_order(order)
            .by(&payment.received_by)
    }
}

/// Rooms for an `order_status` event.
pub fn order_status_rooms(to: OrderStatus) -> Vec<Room> {
    let mut rooms = vec![Room::All];
    match to {
        OrderStatus::Ready => rooms.extend([Room::Kitchen, Room::Waiters]),
        OrderStatus::Completed | OrderStatus::Cancelled => rooms.extend([Room::Pos, Room::Tables]),
        _ => {}
    }
    rooms
}

fn ticket_line(item: &OrderItem) -> Value {
    json!({
        "item_id": item.id,
        "name": item.menu_item_name,
        "quantity": item.quantity,
        "status": item.status,
        "notes": item.notes,
        "modifiers": item.modifiers.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderDetails;
    use crate::types::PaymentMethod;

    fn order() -> Order {
        let details = OrderDetails {
            table_id: Some("t1".into()),
            ..Default::default()
        };
        Order::open("ORD-20261018-0001".into(), "waiter-1", details, Utc::now())
    }

    #[test]
    fn test_room_parsing() {
        assert_eq!("kitchen".parse::<Room>().unwrap(), Room::Kitchen);
        assert_eq!(" all ".parse::<Room>().unwrap(), Room::All);
        assert!("bar".parse::<Room>().is_err());
        assert_eq!(Room::Customers.to_string(), "customers");
    }

    #[test]
    fn test_status_routing() {
        assert_eq!(order_status_rooms(OrderStatus::Preparing), vec![Room::All]);
        assert_eq!(
            order_status_rooms(OrderStatus::Ready),
            vec![Room::All, Room::Kitchen, Room::Waiters]
        );
        let done = order_status_rooms(OrderStatus::Completed);
        assert!(done.contains(&Room::Pos) && done.contains(&Room::Tables));
        let cancelled = order_status_rooms(OrderStatus::Cancelled);
        assert!(cancelled.contains(&Room::Pos) && cancelled.contains(&Room::Tables));
    }

    #[test]
    fn test_targets() {
        let o = order();
        let kitchen = NotificationEvent::kitchen_ticket(&o, Utc::now());
        assert!(kitchen.targets(Room::Kitchen));
        assert!(!kitchen.targets(Room::Pos));
        assert_eq!(kitchen.sound.as_deref(), Some(NEW_ORDER_SOUND));

        let created = NotificationEvent::order_created(&o, "waiter-1", Utc::now());
        assert!(created.targets(Room::Pos));
        assert!(created.targets(Room::Inventory));
    }

    #[test]
    fn test_event_wire_shape() {
        let o = order();
        let event = NotificationEvent::order_status(
            &o,
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            "waiter-1",
            Utc::now(),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "order_status");
        assert_eq!(json["action"], "updated");
        assert_eq!(json["rooms"], json!(["all"]));
        assert_eq!(json["order_id"], o.id.as_str());
        assert_eq!(json["table_id"], "t1");
        assert_eq!(json["user_id"], "waiter-1");
        assert_eq!(json["data"]["status"], "confirmed");
        assert!(json.get("item_id").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_large_payment_reaches_managers() {
        let o = order();
        let mut payment = Payment {
            id: "p1".into(),
            order_id: o.id.clone(),
            method: PaymentMethod::Card,
            amount_cents: 100_000,
            tendered_cents: None,
            change_cents: 0,
            reference: None,
            received_by: "cashier-1".into(),
            created_at: Utc::now(),
        };
        assert_eq!(
            NotificationEvent::payment(&o, &payment, Utc::now()).rooms,
            vec![Room::Pos]
        );

        payment.amount_cents = 100_001;
        assert_eq!(
            NotificationEvent::payment(&o, &payment, Utc::now()).rooms,
            vec![Room::Pos, Room::Managers]
        );
    }

    #[test]
    fn test_default_rooms_by_role() {
        assert_eq!(Room::defaults_for(Role::Kitchen), vec![Room::Kitchen]);
        assert_eq!(
            Room::defaults_for(Role::Waiter),
            vec![Room::Waiters, Room::Tables]
        );
        assert_eq!(Room::defaults_for(Role::Cashier), vec![Room::Pos]);
        assert!(Room::defaults_for(Role::Admin).contains(&Room::Dashboard));
    }
}
