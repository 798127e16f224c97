//! # HTTP Routes
//!
//! Each module exposes `router()`; [`build_router`] merges them.
//!
//! ```text
//! /health                      health  (public)
//! /api/menu/...                menu    (bearer)
//! /api/orders/...              orders  (bearer)
//! /api/tables/...              tables  (bearer)
//! /ws?token=..&rooms=..        ws      (token in query)
//! ```

pub mod health;
pub mod menu;
pub mod orders;
pub mod tables;
pub mod ws;

use axum::Router;

use crate::state::AppState;

/// All routes, without middleware or state.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(menu::router())
        .merge(orders::router())
        .merge(tables::router())
        .merge(ws::router())
}
