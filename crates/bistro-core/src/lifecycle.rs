//! # Order Lifecycle
//!
//! The order status state machine and the side effects of each transition.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   pending ─► confirmed ─► preparing ─► ready ─► served ─► completed     │
//! │      │           │            │          │        │                     │
//! │      └───────────┴────────────┴──────────┴────────┴──────► cancelled    │
//! │                                                                         │
//! │   • any forward jump is legal (pending → ready for simple orders)       │
//! │   • same status or backwards → InvalidTransition                        │
//! │   • completed / cancelled are terminal                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Side Effects
//! | to          | effect                                                    |
//! |-------------|-----------------------------------------------------------|
//! | confirmed+  | `started_at` set if unset                                 |
//! | completed   | `completed_at`; paid = total; payment_status = paid       |
//! | cancelled   | `cancelled_at`                                            |
//! | terminal    | table released (reported in [`Transition::release_table`])|

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::order::Order;
use crate::types::{ItemStatus, OrderStatus, PaymentStatus};

impl OrderStatus {
    /// Position on the forward path. `None` for cancelled.
    fn step(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::Served => Some(4),
            OrderStatus::Completed => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.step(), next.step()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    pub fn check_transition(&self, next: OrderStatus) -> CoreResult<()> {
        if !self.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }
}

impl ItemStatus {
    fn step(&self) -> Option<u8> {
        match self {
            ItemStatus::Pending => Some(0),
            ItemStatus::Preparing => Some(1),
            ItemStatus::Ready => Some(2),
            ItemStatus::Served => Some(3),
            ItemStatus::Cancelled => None,
        }
    }

    /// Served and cancelled lines are final.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Served | ItemStatus::Cancelled)
    }

    /// Same rules as orders: forward only, cancel from any open state.
    pub fn check_transition(&self, next: ItemStatus) -> CoreResult<()> {
        let allowed = !self.is_terminal()
            && match (self.step(), next.step()) {
                (_, None) => true,
                (Some(from), Some(to)) => to > from,
                (None, Some(_)) => false,
            };
        if !allowed {
            return Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a successful status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Table to free because the order reached a terminal status.
    pub release_table: Option<String>,
    pub at: DateTime<Utc>,
}

impl Order {
    /// Moves the order to `next` and applies the side effects.
    ///
    /// On error nothing is changed.
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> CoreResult<Transition> {
        let from = self.status;
        from.check_transition(next)?;

        match next {
            OrderStatus::Completed => {
                self.completed_at = Some(now);
                self.paid_cents = self.total_cents;
                self.remaining_cents = 0;
                self.payment_status = PaymentStatus::Paid;
            }
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
            }
            _ => {}
        }
        if next != OrderStatus::Cancelled && self.started_at.is_none() {
            self.started_at = Some(now);
        }

        self.status = next;
        self.updated_at = now;

        let release_table = if next.is_terminal() {
            self.table_id.clone()
        } else {
            None
        };

        Ok(Transition {
            from,
            to: next,
            release_table,
            at: now,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderDetails;

    fn order_on_table() -> Order {
        let details = OrderDetails {
            table_id: Some("table-1".into()),
            ..Default::default()
        };
        let mut order = Order::open("ORD-1".into(), "u", details, Utc::now());
        order.total_cents = 3100;
        order.remaining_cents = 3100;
        order
    }

    #[test]
    fn test_forward_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Ready));
        assert!(Served.can_transition_to(Completed));
        assert!(Preparing.can_transition_to(Cancelled));
    }

    #[test]
    fn test_rejected_transitions() {
        use OrderStatus::*;
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} → {status}");
            assert!(!Completed.can_transition_to(status));
            assert!(!Cancelled.can_transition_to(status));
        }
        assert!(!Ready.can_transition_to(Preparing));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn test_completed_to_preparing_leaves_order_untouched() {
        let mut order = order_on_table();
        order.transition_to(OrderStatus::Completed, Utc::now()).unwrap();
        let before = order.updated_at;

        let err = order
            .transition_to(OrderStatus::Preparing, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.updated_at, before);
    }

    #[test]
    fn test_confirm_sets_started_at_once() {
        let mut order = order_on_table();
        let t1 = Utc::now();
        order.transition_to(OrderStatus::Confirmed, t1).unwrap();
        assert_eq!(order.started_at, Some(t1));

        order
            .transition_to(OrderStatus::Preparing, t1 + chrono::Duration::seconds(5))
            .unwrap();
        assert_eq!(order.started_at, Some(t1));
    }

    #[test]
    fn test_complete_marks_paid_and_releases_table() {
        let mut order = order_on_table();
        let t = order.transition_to(OrderStatus::Completed, Utc::now()).unwrap();

        assert_eq!(t.from, OrderStatus::Pending);
        assert_eq!(t.release_table.as_deref(), Some("table-1"));
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.paid_cents, 3100);
        assert_eq!(order.remaining_cents, 0);
        assert!(order.completed_at.is_some());
        assert!(order.cancelled_at.is_none());
    }

    #[test]
    fn test_cancel_from_pending() {
        let mut order = order_on_table();
        let t = order.transition_to(OrderStatus::Cancelled, Utc::now()).unwrap();

        assert_eq!(t.release_table.as_deref(), Some("table-1"));
        assert!(order.cancelled_at.is_some());
        assert!(order.completed_at.is_none());
        assert!(order.started_at.is_none());
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_non_terminal_transition_keeps_table() {
        let mut order = order_on_table();
        let t = order.transition_to(OrderStatus::Ready, Utc::now()).unwrap();
        assert!(t.release_table.is_none());
    }

    #[test]
    fn test_item_transitions() {
        use ItemStatus::*;
        assert!(Pending.check_transition(Ready).is_ok());
        assert!(Preparing.check_transition(Cancelled).is_ok());
        assert!(Ready.check_transition(Preparing).is_err());
        assert!(Served.check_transition(Cancelled).is_err());
        assert!(Cancelled.check_transition(Pending).is_err());
    }
}
