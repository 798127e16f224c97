//! # Bistro POS API
//!
//! REST and WebSocket surface of the restaurant backend.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP ──► Trace/CORS ──► Principal ──► route ──► OrderEngine            │
//! │                           (JWT)                    │        │           │
//! │                                                    ▼        ▼           │
//! │                                              bistro-db   bistro-hub     │
//! │                                              (commit)    (publish)      │
//! │                                                                         │
//! │  WS /ws?token ──► session_params ──► Hub::connect ──► room fan-out      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are published only after the store commits, so a failed mutation
//! never reaches a client.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Builds the full application with middleware and state attached.
pub fn build_app(state: AppState) -> Router {
    routes::build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
