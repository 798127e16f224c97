//! # Hub Protocol Messages
//!
//! Control frames exchanged with push clients (kitchen displays, POS
//! terminals, waiter tablets).
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Hub Protocol Messages                             │
//! │                                                                         │
//! │  HANDSHAKE                                                              │
//! │  ─────────                                                              │
//! │  CLIENT    ───► GET /ws?token=...&rooms=kitchen,pos                     │
//! │  SERVER    ───► Welcome { connection_id, rooms }                        │
//! │                                                                         │
//! │  MEMBERSHIP                                                             │
//! │  ──────────                                                             │
//! │  CLIENT    ───► Subscribe { room }      SERVER ───► Subscribed { room } │
//! │  CLIENT    ───► Unsubscribe { room }    SERVER ───► Unsubscribed        │
//! │                                                                         │
//! │  EVENTS                                                                 │
//! │  ──────                                                                 │
//! │  SERVER    ───► NotificationEvent (order, kitchen_order, payment, ...)  │
//! │                                                                         │
//! │  KEEPALIVE / ERROR                                                      │
//! │  ─────────────────                                                      │
//! │  CLIENT    ───► Ping                    SERVER ───► Pong                │
//! │  SERVER    ───► Error { code, message }                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Internally tagged JSON: `{"type": "subscribe", "room": "kitchen"}`.

use bistro_core::Room;
use serde::{Deserialize, Serialize};

use crate::registry::ConnectionId;

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { room: Room },
    Unsubscribe { room: Room },
    Ping,
}

/// Control frames the server sends. Events go out as `NotificationEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        connection_id: ConnectionId,
        rooms: Vec<Room>,
    },
    Subscribed {
        room: Room,
    },
    Unsubscribed {
        room: Room,
    },
    Pong,
    Error {
        code: String,
        message: String,
    },
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages() {
        let msg = ClientMessage::from_json(r#"{"type":"subscribe","room":"kitchen"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Subscribe { room: Room::Kitchen });

        let msg = ClientMessage::from_json(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);

        assert!(ClientMessage::from_json(r#"{"type":"subscribe","room":"attic"}"#).is_err());
    }

    #[test]
    fn test_server_messages() {
        let json = ServerMessage::Welcome {
            connection_id: 7,
            rooms: vec![Room::Waiters, Room::Tables],
        }
        .to_json()
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"welcome","connection_id":7,"rooms":["waiters","tables"]}"#
        );
        assert_eq!(ServerMessage::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);
    }
}
