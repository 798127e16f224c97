//! # Repository Pattern Implementation
//!
//! Repositories encapsulate the SQL for each aggregate.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Repository Pattern                               │
//! │                                                                         │
//! │  pos-api services                                                       │
//! │       │                                                                 │
//! │       │  db.orders().transition(id, OrderStatus::Completed)             │
//! │       ▼                                                                 │
//! │  OrderRepository                                                        │
//! │  ├── BEGIN; lock order row (version + 1)                                │
//! │  ├── load Order + items                                                 │
//! │  ├── bistro-core rule (Order::transition_to, add_item, ...)             │
//! │  ├── write header / lines / table release                               │
//! │  └── COMMIT                                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (sqlx runtime queries)                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Repositories
//! - [`audit::AuditRepository`]: who changed which order or table
//! - [`menu::MenuRepository`]: menu items and modifier options
//! - [`order::OrderRepository`]: orders, lines, payments, lifecycle
//! - [`table::TableRepository`]: the Table Registry

pub mod audit;
pub mod menu;
pub mod order;
pub mod table;
