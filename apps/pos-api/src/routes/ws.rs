//! WebSocket endpoint of the Notification Hub.
//!
//! `GET /ws?token=<jwt>&rooms=kitchen,pos`
//!
//! Browsers can't set headers on a WebSocket handshake, so the token travels
//! in the query string. Without `rooms` the connection joins the defaults
//! for the caller's role.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
    routing::get,
    Router,
};
use bistro_core::Room;
use bistro_hub::{serve_socket, ConnectionInfo};
use serde::Deserialize;
use tracing::info;

use crate::auth::JwtManager;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub token: Option<String>,
    /// Comma-separated room names.
    #[serde(default)]
    pub rooms: Option<String>,
}

async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let (info, rooms) = session_params(&state.jwt, &query)?;
    info!(user_id = %info.user_id, rooms = ?rooms, "WebSocket upgrade");

    let hub = state.hub.clone();
    let max_message_size = hub.settings().max_message_size;
    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| serve_socket(hub, socket, info, rooms)))
}

/// Authenticates the handshake and resolves the initial rooms.
pub fn session_params(
    jwt: &JwtManager,
    query: &SessionQuery,
) -> ApiResult<(ConnectionInfo, Vec<Room>)> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
    let principal = jwt.principal(token)?;

    let rooms = match query.rooms.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(list) => parse_rooms(list)?,
        None => Room::defaults_for(principal.role),
    };

    let info = ConnectionInfo {
        user_id: principal.user_id,
        role: principal.role,
    };
    Ok((info, rooms))
}

fn parse_rooms(list: &str) -> ApiResult<Vec<Room>> {
    let mut rooms = Vec::new();
    for name in list.split(',').filter(|n| !n.trim().is_empty()) {
        let room: Room = name
            .parse()
            .map_err(|e: bistro_core::ValidationError| ApiError::BadRequest(e.to_string()))?;
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }
    Ok(rooms)
}
