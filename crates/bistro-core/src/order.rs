//! # Order Aggregate
//!
//! An [`Order`] owns its [`OrderItem`]s and every derived monetary field.
//! All operations here are pure: they validate, mutate the in-memory
//! aggregate and recalculate totals. Persisting the result is the store's job.
//!
//! ## Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Operations                                 │
//! │                                                                         │
//! │   Order::open()                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   add_item / update_item / remove_item / apply_discount                 │
//! │       │              (each ends in recalculate)                         │
//! │       ▼                                                                 │
//! │   record_payment ──► paid / remaining / payment_status                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   transition_to (see lifecycle) ──► completed | cancelled               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Policy
//! Line totals and the subtotal are exact integer cents. Tax and service are
//! kept unrounded ([`ExactAmount`]) and the total is rounded **once**, half to
//! even. The rounded charges (`total - subtotal + discount`) are then split:
//! tax is its own rounded amount, service takes the remainder, so
//! `total = subtotal + tax + service - discount` always holds to the cent.
//! When the discount exceeds everything else the total is floored at zero.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{ExactAmount, Money};
use crate::types::{
    CustomerInfo, ItemStatus, MenuItem, ModifierOption, OrderStatus, OrderType, Payment,
    PaymentMethod, PaymentStatus, PricingRates, Priority,
};
use crate::validation::{validate_discount_cents, validate_notes};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Order Item
// =============================================================================

/// A modifier as it was when the line was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectedModifier {
    pub option_id: String,
    pub name: String,
    pub price_delta_cents: i64,
}

/// A line on an order.
/// Name, unit price and modifiers are snapshots taken when the line is added.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    pub menu_item_name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub modifiers: Vec<SelectedModifier>,
    pub status: ItemStatus,
    pub notes: Option<String>,
    /// Kitchen display order.
    pub position: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Unit price plus every modifier delta.
    pub fn unit_total(&self) -> Money {
        let cents = self
            .modifiers
            .iter()
            .fold(self.unit_price_cents, |acc, m| acc.saturating_add(m.price_delta_cents));
        Money::from_cents(cents)
    }

    /// `quantity × (unit_price + Σ deltas)`.
    pub fn line_total(&self) -> Money {
        self.unit_total().multiply_quantity(self.quantity)
    }

    /// [`OrderItem::line_total`] for a line about to be stored.
    ///
    /// ## Errors
    /// - `InvalidItem` if the modifiers push the unit price below zero
    /// - `Validation` if the amount does not fit in cents
    pub fn checked_line_total(&self) -> CoreResult<Money> {
        let unit = self
            .modifiers
            .iter()
            .try_fold(Money::from_cents(self.unit_price_cents), |acc, m| {
                acc.checked_add(Money::from_cents(m.price_delta_cents))
            })
            .ok_or_else(|| amount_too_large("unit_price"))?;
        if unit.is_negative() {
            return Err(CoreError::InvalidItem(format!(
                "{} would cost {} per unit",
                self.menu_item_name, unit
            )));
        }
        unit.checked_mul_quantity(self.quantity)
            .ok_or_else(|| amount_too_large("line_total"))
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == ItemStatus::Cancelled
    }
}

/// Request to add a line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemRequest {
    pub menu_item_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub modifier_ids: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of a line. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemChanges {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub modifier_ids: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

impl ItemChanges {
    /// True when the change affects the line price.
    pub fn reprices(&self) -> bool {
        self.quantity.is_some() || self.modifier_ids.is_some()
    }
}

/// What [`Order::update_item`] did.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub item: OrderItem,
    /// `(from, to)` when the kitchen status moved.
    pub status_change: Option<(ItemStatus, ItemStatus)>,
    /// Totals were recalculated.
    pub repriced: bool,
}

// =============================================================================
// Totals
// =============================================================================

/// Derived monetary fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub service_charge: Money,
    pub discount: Money,
    pub total: Money,
}

impl Totals {
    /// Computes totals for a set of lines.
    ///
    /// Cancelled lines are excluded. Rounding happens once, at the total.
    ///
    /// ```rust
    /// use bistro_core::money::Money;
    /// use bistro_core::order::Totals;
    /// use bistro_core::types::PricingRates;
    ///
    /// let totals = Totals::compute(Money::from_cents(2500), Money::zero(), PricingRates::default());
    /// assert_eq!(totals.total.cents(), 3100);
    /// ```
    pub fn compute(subtotal: Money, discount: Money, rates: PricingRates) -> Self {
        let tax_exact = subtotal.apply_rate(rates.tax);
        let service_exact = subtotal.apply_rate(rates.service_charge);
        let gross: ExactAmount = subtotal.exact() + tax_exact + service_exact - discount.exact();

        let total = gross.round_half_even();

        if total.is_negative() {
            return Totals {
                subtotal,
                tax: tax_exact.round_half_even(),
                service_charge: service_exact.round_half_even(),
                discount,
                total: Money::zero(),
            };
        }

        // Rounded tax + service together. Never negative: rounding is
        // monotonic and both rated amounts are >= 0.
        let charges = total - subtotal + discount;
        let tax = if rates.service_charge.is_zero() {
            charges
        } else if rates.tax.is_zero() {
            Money::zero()
        } else {
            tax_exact.round_half_even().min(charges)
        };

        Totals {
            subtotal,
            tax,
            service_charge: charges - tax,
            discount,
            total,
        }
    }

    /// Like [`Totals::compute`], but fails when tax and service charge
    /// push the total past `i64` cents.
    pub fn checked_compute(
        subtotal: Money,
        discount: Money,
        rates: PricingRates,
    ) -> CoreResult<Self> {
        let gross = subtotal.exact()
            + subtotal.apply_rate(rates.tax)
            + subtotal.apply_rate(rates.service_charge);
        gross
            .checked_round_half_even()
            .ok_or_else(|| amount_too_large("total"))?;
        Ok(Self::compute(subtotal, discount, rates))
    }

    /// Sums the non-cancelled lines.
    pub fn subtotal_of(items: &[OrderItem]) -> Money {
        let cents = items
            .iter()
            .filter(|item| !item.is_cancelled())
            .fold(0i64, |acc, item| acc.saturating_add(item.line_total().cents()));
        Money::from_cents(cents)
    }

    /// Subtotal of a prospective set of lines, rejecting any line or sum
    /// that cannot be priced.
    pub fn checked_subtotal<'a>(items: impl IntoIterator<Item = &'a OrderItem>) -> CoreResult<Money> {
        items
            .into_iter()
            .filter(|item| !item.is_cancelled())
            .try_fold(Money::zero(), |acc, item| {
                acc.checked_add(item.checked_line_total()?)
                    .ok_or_else(|| amount_too_large("subtotal"))
            })
    }
}

// =============================================================================
// Order
// =============================================================================

/// Header fields supplied when an order is opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetails {
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub kitchen_notes: Option<String>,
}

/// A restaurant order with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-readable, `ORD-YYYYMMDD-NNNN`.
    pub order_number: String,
    pub table_id: Option<String>,
    /// Staff member who opened the order.
    pub user_id: String,
    pub order_type: OrderType,
    pub priority: Priority,
    pub status: OrderStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub service_charge_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub kitchen_notes: Option<String>,
    /// Bumped by every stored mutation.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Loaded separately by the store.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Opens an empty pending order.
    pub fn open(
        order_number: String,
        user_id: impl Into<String>,
        details: OrderDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Order {
            id: Uuid::new_v4().to_string(),
            order_number,
            table_id: details.table_id,
            user_id: user_id.into(),
            order_type: details.order_type,
            priority: details.priority,
            status: OrderStatus::Pending,
            customer_name: details.customer.name,
            customer_phone: details.customer.phone,
            customer_address: details.customer.address,
            subtotal_cents: 0,
            tax_cents: 0,
            service_charge_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            paid_cents: 0,
            remaining_cents: 0,
            payment_status: PaymentStatus::Unpaid,
            notes: details.notes,
            kitchen_notes: details.kitchen_notes,
            version: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            items: Vec::new(),
        }
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }

    /// Current totals as stored on the order.
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: Money::from_cents(self.subtotal_cents),
            tax: Money::from_cents(self.tax_cents),
            service_charge: Money::from_cents(self.service_charge_cents),
            discount: Money::from_cents(self.discount_cents),
            total: Money::from_cents(self.total_cents),
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Fails with `OrderClosed` on completed or cancelled orders.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::OrderClosed {
                order_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Appends a line built from `menu_item` and its `options`.
    ///
    /// ## Errors
    /// - `InvalidQuantity` if quantity is outside 1..=999
    /// - `ItemUnavailable` if the menu item is switched off
    /// - `InvalidItem` if the request names another item or an unknown option
    /// - `OrderClosed` on terminal orders
    pub fn add_item(
        &mut self,
        menu_item: &MenuItem,
        options: &[ModifierOption],
        request: &ItemRequest,
        rates: PricingRates,
        now: DateTime<Utc>,
    ) -> CoreResult<OrderItem> {
        self.ensure_open()?;

        if request.menu_item_id != menu_item.id {
            return Err(CoreError::InvalidItem(format!(
                "menu item {} does not match request for {}",
                menu_item.id, request.menu_item_id
            )));
        }
        check_quantity(request.quantity)?;
        if !menu_item.is_available {
            return Err(CoreError::ItemUnavailable(menu_item.name.clone()));
        }
        let modifiers = resolve_modifiers(&menu_item.id, options, &request.modifier_ids)?;
        if let Some(notes) = &request.notes {
            validate_notes(notes)?;
        }

        let position = self.items.iter().map(|i| i.position).max().unwrap_or(0) + 1;
        let item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: self.id.clone(),
            menu_item_id: menu_item.id.clone(),
            menu_item_name: menu_item.name.clone(),
            unit_price_cents: menu_item.price_cents,
            quantity: request.quantity,
            modifiers,
            status: ItemStatus::Pending,
            notes: request.notes.clone(),
            position,
            created_at: now,
            updated_at: now,
        };

        let subtotal = Totals::checked_subtotal(self.items.iter().chain(std::iter::once(&item)))?;
        Totals::checked_compute(subtotal, Money::from_cents(self.discount_cents), rates)?;

        self.items.push(item.clone());
        self.recalculate(rates);
        self.updated_at = now;
        Ok(item)
    }

    /// Removes a line.
    pub fn remove_item(
        &mut self,
        item_id: &str,
        rates: PricingRates,
        now: DateTime<Utc>,
    ) -> CoreResult<OrderItem> {
        self.ensure_open()?;

        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        let removed = self.items.remove(index);
        self.recalculate(rates);
        self.updated_at = now;
        Ok(removed)
    }

    /// Applies a partial update to a line.
    ///
    /// Everything is validated before anything changes. `options` are the
    /// modifier options of the line's menu item; only consulted when
    /// `changes.modifier_ids` is set.
    pub fn update_item(
        &mut self,
        item_id: &str,
        changes: &ItemChanges,
        options: &[ModifierOption],
        rates: PricingRates,
        now: DateTime<Utc>,
    ) -> CoreResult<ItemUpdate> {
        self.ensure_open()?;

        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
        let current = &self.items[index];

        if current.is_cancelled() && (changes.reprices() || changes.notes.is_some()) {
            return Err(CoreError::InvalidItem(format!(
                "item {} is cancelled",
                current.id
            )));
        }
        if let Some(quantity) = changes.quantity {
            check_quantity(quantity)?;
        }
        let modifiers = match &changes.modifier_ids {
            Some(ids) => Some(resolve_modifiers(&current.menu_item_id, options, ids)?),
            None => None,
        };
        if let Some(notes) = &changes.notes {
            validate_notes(notes)?;
        }
        let status_change = match changes.status {
            Some(next) if next != current.status => {
                current.status.check_transition(next)?;
                Some((current.status, next))
            }
            _ => None,
        };

        if changes.reprices() {
            let mut candidate = current.clone();
            if let Some(quantity) = changes.quantity {
                candidate.quantity = quantity;
            }
            if let Some(modifiers) = &modifiers {
                candidate.modifiers = modifiers.clone();
            }
            let subtotal = Totals::checked_subtotal(
                self.items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| if i == index { &candidate } else { item }),
            )?;
            Totals::checked_compute(subtotal, Money::from_cents(self.discount_cents), rates)?;
        }

        // Validated; apply.
        let item = &mut self.items[index];
        if let Some(quantity) = changes.quantity {
            item.quantity = quantity;
        }
        if let Some(modifiers) = modifiers {
            item.modifiers = modifiers;
        }
        if let Some(notes) = &changes.notes {
            item.notes = Some(notes.clone());
        }
        if let Some((_, next)) = status_change {
            item.status = next;
        }
        item.updated_at = now;
        let item = item.clone();

        // Cancelling a line drops it from the subtotal.
        let repriced = changes.reprices()
            || matches!(status_change, Some((_, ItemStatus::Cancelled)));
        if repriced {
            self.recalculate(rates);
        }
        self.updated_at = now;

        Ok(ItemUpdate {
            item,
            status_change,
            repriced,
        })
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Recomputes every derived monetary field from the lines and rates.
    ///
    /// Idempotent: calling it twice without changes yields the same totals.
    pub fn recalculate(&mut self, rates: PricingRates) -> Totals {
        let subtotal = Totals::subtotal_of(&self.items);
        let totals = Totals::compute(subtotal, Money::from_cents(self.discount_cents), rates);

        self.subtotal_cents = totals.subtotal.cents();
        self.tax_cents = totals.tax.cents();
        self.service_charge_cents = totals.service_charge.cents();
        self.total_cents = totals.total.cents();
        self.refresh_balance();
        totals
    }

    /// Sets the order-level discount and recalculates.
    pub fn apply_discount(
        &mut self,
        discount: Money,
        rates: PricingRates,
        now: DateTime<Utc>,
    ) -> CoreResult<Totals> {
        self.ensure_open()?;
        validate_discount_cents(discount.cents())?;

        self.discount_cents = discount.cents();
        let totals = self.recalculate(rates);
        self.updated_at = now;
        Ok(totals)
    }

    /// Keeps `remaining = total - paid` (never negative) and the payment status
    /// in line with it.
    fn refresh_balance(&mut self) {
        self.remaining_cents = (self.total() - Money::from_cents(self.paid_cents))
            .floor_zero()
            .cents();

        if self.payment_status == PaymentStatus::Refunded {
            return;
        }
        self.payment_status = if self.paid_cents == 0 {
            PaymentStatus::Unpaid
        } else if self.remaining_cents == 0 {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records a payment against the remaining balance.
    ///
    /// ## Rules
    /// - Not allowed on cancelled orders
    /// - Amount must be positive and at most `remaining`
    /// - Cash may carry a tendered amount; change is `tendered - amount`
    #[allow(clippy::too_many_arguments)]
    pub fn record_payment(
        &mut self,
        method: PaymentMethod,
        amount: Money,
        tendered: Option<Money>,
        reference: Option<String>,
        received_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        if self.status == OrderStatus::Cancelled {
            return Err(CoreError::OrderClosed {
                order_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be positive".to_string(),
            });
        }
        if amount > self.remaining() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!(
                    "amount {} exceeds remaining balance {}",
                    amount,
                    self.remaining()
                ),
            });
        }

        let (tendered_cents, change_cents) = match (method, tendered) {
            (PaymentMethod::Cash, Some(tendered)) => {
                if tendered < amount {
                    return Err(CoreError::InvalidPaymentAmount {
                        reason: format!("tendered {} is less than amount {}", tendered, amount),
                    });
                }
                (Some(tendered.cents()), (tendered - amount).cents())
            }
            (PaymentMethod::Cash, None) => (Some(amount.cents()), 0),
            _ => (None, 0),
        };

        self.paid_cents += amount.cents();
        self.refresh_balance();
        self.updated_at = now;

        Ok(Payment {
            id: Uuid::new_v4().to_string(),
            order_id: self.id.clone(),
            method,
            amount_cents: amount.cents(),
            tendered_cents,
            change_cents,
            reference,
            received_by: received_by.into(),
            created_at: now,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn amount_too_large(field: &str) -> CoreError {
    CoreError::Validation(ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    })
}

fn check_quantity(quantity: i64) -> CoreResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(CoreError::InvalidQuantity {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Resolves option ids against the options of one menu item.
fn resolve_modifiers(
    menu_item_id: &str,
    options: &[ModifierOption],
    ids: &[String],
) -> CoreResult<Vec<SelectedModifier>> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| {
            if !seen.insert(id.as_str()) {
                return Err(CoreError::InvalidItem(format!("modifier {} selected twice", id)));
            }
            options
                .iter()
                .find(|option| option.id == *id && option.menu_item_id == menu_item_id)
                .map(|option| SelectedModifier {
                    option_id: option.id.clone(),
                    name: option.name.clone(),
                    price_delta_cents: option.price_delta_cents,
                })
                .ok_or_else(|| {
                    CoreError::InvalidItem(format!(
                        "modifier {} does not belong to menu item {}",
                        id, menu_item_id
                    ))
                })
        })
        .collect()
}

/// Formats a daily order number: `ORD-20261018-0042`.
pub fn format_order_number(day: NaiveDate, sequence: i64) -> String {
    format!("ORD-{}-{:04}", day.format("%Y%m%d"), sequence)
}

// =============================================================================
// Unit Tests
// =============================================================================
