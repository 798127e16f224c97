//! Health check. Public.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = state.db.health_check().await;
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "connections": state.hub.connection_count().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
