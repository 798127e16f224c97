//! # Domain Types
//!
//! Core domain types shared by every layer of Bistro POS.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Model                                    │
//! │                                                                         │
//! │  ┌─────────────┐        ┌─────────────┐        ┌──────────────────┐     │
//! │  │  MenuItem   │◄───────│  OrderItem  │───────►│ SelectedModifier │     │
//! │  │  (catalog)  │  ref   │  (snapshot) │  1..n  │   (snapshot)     │     │
//! │  └──────┬──────┘        └──────┬──────┘        └──────────────────┘     │
//! │         │ 1..n                 │ n..1                                   │
//! │  ┌──────▼─────────┐     ┌──────▼──────┐        ┌─────────────┐          │
//! │  │ ModifierOption │     │    Order    │───────►│   Payment   │          │
//! │  └────────────────┘     └──────┬──────┘  1..n  └─────────────┘          │
//! │                                │ 0..1                                   │
//! │                         ┌──────▼──────┐                                 │
//! │                         │    Table    │  current_order_id ⇔ occupied    │
//! │                         └─────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Order`](crate::order::Order) and [`OrderItem`](crate::order::OrderItem)
//! live in [`crate::order`] together with their operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Order Status
// =============================================================================

/// Where an order is in its life.
///
/// ```text
/// pending → confirmed → preparing → ready → served → completed
///     └──────────┴───────────┴─────────┴───────┴────► cancelled
/// ```
///
/// Transition rules live in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Type / Priority
// =============================================================================

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
    Online,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::DineIn
    }
}

/// Kitchen priority. Urgent tickets are highlighted on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

// =============================================================================
// Payment Status / Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash; may carry a tendered amount and change.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Mobile wallet transfer.
    Wallet,
}

// =============================================================================
// Item Status
// =============================================================================

/// Per-line kitchen status. A subset of [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Preparing => "preparing",
            ItemStatus::Ready => "ready",
            ItemStatus::Served => "served",
            ItemStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Pending
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Table Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    /// Set only through assignment; always paired with a current order.
    Occupied,
    Reserved,
    Dirty,
    Maintenance,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
            TableStatus::Reserved => "reserved",
            TableStatus::Dirty => "dirty",
            TableStatus::Maintenance => "maintenance",
        }
    }
}

impl Default for TableStatus {
    fn default() -> Self {
        TableStatus::Available
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Role
// =============================================================================

/// Staff role carried in the auth token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Passes every role check.
    SuperAdmin,
    Admin,
    Manager,
    Cashier,
    Waiter,
    Kitchen,
    Staff,
}

impl Role {
    /// True if this role satisfies any of `allowed`.
    pub fn is_any_of(&self, allowed: &[Role]) -> bool {
        *self == Role::SuperAdmin || allowed.contains(self)
    }
}

// =============================================================================
// Menu
// =============================================================================

/// A dish or drink on the menu.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Current price in cents. Orders snapshot this at add time.
    pub price_cents: i64,
    /// Switched off when sold out.
    pub is_available: bool,
    /// Expected preparation time shown on the kitchen display.
    pub preparation_minutes: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// An option a guest can pick for a menu item ("extra cheese", "large").
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ModifierOption {
    pub id: String,
    pub menu_item_id: String,
    pub name: String,
    /// Added to the unit price, may be negative.
    pub price_delta_cents: i64,
    pub is_default: bool,
}

// =============================================================================
// Table
// =============================================================================

/// A dining table.
///
/// Occupancy rules are in [`crate::table`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Table {
    pub id: String,
    /// Unique number printed on the table.
    pub number: i64,
    pub name: Option<String>,
    pub section: Option<String>,
    pub capacity: i64,
    pub status: TableStatus,
    pub current_order_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Cash handed over, when method is cash.
    pub tendered_cents: Option<i64>,
    pub change_cents: i64,
    /// Card slip or wallet transaction reference.
    pub reference: Option<String>,
    pub received_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Rates applied by order recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingRates {
    pub tax: Rate,
    pub service_charge: Rate,
}

impl PricingRates {
    pub const fn new(tax: Rate, service_charge: Rate) -> Self {
        Self {
            tax,
            service_charge,
        }
    }
}

impl Default for PricingRates {
    /// 14% tax, 10% service.
    fn default() -> Self {
        Self::new(Rate::from_bps(1400), Rate::from_bps(1000))
    }
}

/// Contact details captured for delivery, takeaway and receipts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            serde_json::to_string(&OrderType::DineIn).unwrap(),
            "\"dine_in\""
        );
        let role: Role = serde_json::from_str("\"super_admin\"").unwrap();
        assert_eq!(role, Role::SuperAdmin);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(TableStatus::default(), TableStatus::Available);
        assert_eq!(PricingRates::default().tax.bps(), 1400);
        assert_eq!(PricingRates::default().service_charge.bps(), 1000);
    }

    #[test]
    fn test_role_checks() {
        assert!(Role::Manager.is_any_of(&[Role::Admin, Role::Manager]));
        assert!(!Role::Waiter.is_any_of(&[Role::Admin, Role::Manager]));
        assert!(Role::SuperAdmin.is_any_of(&[Role::Kitchen]));
        assert!(Role::SuperAdmin.is_any_of(&[]));
    }
}
