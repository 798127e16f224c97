//! # bistro-core: Pure Domain Logic for Bistro POS
//!
//! Orders, totals, the status state machine, table occupancy rules and the
//! notification events they produce. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bistro POS Backend                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │          apps/pos-api (REST + WebSocket, OrderEngine)           │    │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘    │
//! │                  │                             │                        │
//! │  ┌───────────────▼──────────────┐  ┌───────────▼──────────────────┐     │
//! │  │  bistro-db (SQLite store,    │  │  bistro-hub (rooms, queues,  │     │
//! │  │  Table Registry)             │  │  WebSocket sessions)         │     │
//! │  └───────────────┬──────────────┘  └───────────┬──────────────────┘     │
//! │                  │                             │                        │
//! │  ┌───────────────▼─────────────────────────────▼──────────────────┐     │
//! │  │               ★ bistro-core (THIS CRATE) ★                     │     │
//! │  │                                                                │     │
//! │  │  money   order   lifecycle   table   notification   types      │     │
//! │  │                                                                │     │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │     │
//! │  └────────────────────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money, basis-point rates, half-even rounding
//! - [`types`] - Enums and catalogue/table/payment records
//! - [`order`] - The order aggregate and totals
//! - [`lifecycle`] - Status state machine and transition side effects
//! - [`table`] - Occupancy rules for the Table Registry
//! - [`notification`] - Rooms, events and routing
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bistro_core::{Money, PricingRates};
//! use bistro_core::order::Totals;
//!
//! let totals = Totals::compute(Money::from_cents(2500), Money::zero(), PricingRates::default());
//! assert_eq!(totals.tax.cents(), 350);
//! assert_eq!(totals.service_charge.cents(), 250);
//! assert_eq!(totals.total.to_string(), "31.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod notification;
pub mod order;
pub mod table;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::Transition;
pub use money::{Money, Rate};
pub use notification::{EventKind, NotificationEvent, Room};
pub use order::{ItemChanges, ItemRequest, Order, OrderDetails, OrderItem, Totals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity on a single order line.
///
/// ## Business Reason
/// Catches fat-finger entries (1000 instead of 10) at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest menu price or modifier delta, in cents (1,000,000.00).
///
/// Keeps `quantity × unit price` far from `i64` overflow.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Largest page size accepted by list endpoints.
pub const MAX_PAGE_LIMIT: i64 = 200;
