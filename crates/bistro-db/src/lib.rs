//! # bistro-db: Durable Store for Bistro POS
//!
//! SQLite storage for the menu, orders, payments and the Table Registry,
//! using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bistro POS Data Flow                             │
//! │                                                                         │
//! │  pos-api OrderEngine (transition, add_item, transfer, ...)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     bistro-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ MenuRepo       │    │              │   │    │
//! │  │   │ SqlitePool    │◄───│ OrderRepo      │    │ 001_initial  │   │    │
//! │  │   │ WAL, busy     │    │ TableRepo      │    │              │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (DATABASE_PATH)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Menu, order, table and audit repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bistro_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bistro.db")).await?;
//! let created = db.orders().create(&user_id, details, &items, rates).await?;
//! db.tables().transfer(&created.order.id, &from, &to, &user_id).await?;
//! let trail = db.audit().for_entity("table", &to).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::{AuditEntry, AuditRepository};
pub use repository::menu::{MenuRepository, NewMenuItem, NewModifierOption};
pub use repository::order::{
    CreatedOrder, OrderFilter, OrderRepository, PaymentRequest, StatusChange,
};
pub use repository::table::{NewTable, TableRepository, TableTransfer};
