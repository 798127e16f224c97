//! # WebSocket Session
//!
//! Drives one upgraded socket: registers it with the [`Hub`], runs the
//! writer task that drains its queue, and answers client control frames.
//!
//! ## Session Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          serve_socket()                                 │
//! │                                                                         │
//! │  hub.connect(info, rooms) ──► (id, queue rx)                            │
//! │       │                                                                 │
//! │       ├──► writer task                                                  │
//! │       │      select { queue frame | ping tick }                         │
//! │       │      timeout(write_timeout, sink.send(..))                      │
//! │       │      error / timeout / queue closed → stop                      │
//! │       │                                                                 │
//! │       └──► receive loop (this task)                                     │
//! │              subscribe / unsubscribe / ping → reply via hub.send_to     │
//! │              close / error / writer stopped → stop                      │
//! │                                                                         │
//! │  cleanup: abort writer, hub.disconnect(id)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bistro_core::Room;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::HubError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ConnectionId, ConnectionInfo, Hub};

/// Runs a connection until the client leaves or delivery fails.
pub async fn serve_socket(hub: Arc<Hub>, socket: WebSocket, info: ConnectionInfo, rooms: Vec<Room>) {
    let (mut sink, mut stream) = socket.split();
    let (id, mut queue) = hub.connect(info, rooms.iter().copied()).await;

    if let Err(e) = hub
        .send_to(id, &ServerMessage::Welcome { connection_id: id, rooms })
        .await
    {
        warn!(connection_id = id, ?e, "Failed to queue Welcome");
        return;
    }

    let write_timeout = hub.settings().write_timeout();
    let write_timeout_ms = hub.settings().write_timeout_ms;
    let ping_every = hub.settings().ping_interval();

    // Single writer per socket keeps per-connection order.
    let mut writer = tokio::spawn(async move {
        let mut ping = interval(ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;

        loop {
            let msg = tokio::select! {
                frame = queue.recv() => match frame {
                    Some(frame) => Message::Text(frame.to_string().into()),
                    None => break,
                },
                _ = ping.tick() => Message::Ping(axum::body::Bytes::new()),
            };

            let outcome = match timeout(write_timeout, sink.send(msg)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(HubError::from(e)),
                Err(_) => Err(HubError::WriteTimeout(write_timeout_ms)),
            };
            if let Err(e) = outcome {
                warn!(connection_id = id, error = %e, "Write failed, dropping connection");
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = match ClientMessage::from_json(&text) {
                        Ok(msg) => respond(&hub, id, msg).await,
                        Err(e) => {
                            debug!(connection_id = id, ?e, "Invalid client frame");
                            ServerMessage::error("invalid_message", e.to_string())
                        }
                    };
                    if hub.send_to(id, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    let reply = ServerMessage::error("invalid_message", "binary frames are not supported");
                    if hub.send_to(id, &reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!(connection_id = id, "Client requested close");
                    break;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // axum answers pings itself
                }
                Some(Err(e)) => {
                    warn!(connection_id = id, ?e, "WebSocket error");
                    break;
                }
                None => {
                    info!(connection_id = id, "Client disconnected");
                    break;
                }
            },
            _ = &mut writer => {
                debug!(connection_id = id, "Writer stopped");
                break;
            }
        }
    }

    // Cleanup
    writer.abort();
    hub.disconnect(id).await;
}

/// Applies a client control frame and builds the reply.
pub async fn respond(hub: &Hub, id: ConnectionId, msg: ClientMessage) -> ServerMessage {
    let result = match msg {
        ClientMessage::Subscribe { room } => hub
            .subscribe(id, room)
            .await
            .map(|_| ServerMessage::Subscribed { room }),
        ClientMessage::Unsubscribe { room } => hub
            .unsubscribe(id, room)
            .await
            .map(|_| ServerMessage::Unsubscribed { room }),
        ClientMessage::Ping => Ok(ServerMessage::Pong),
    };
    result.unwrap_or_else(|e| ServerMessage::error(e.code(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubSettings;
    use bistro_core::Role;

    #[tokio::test]
    async fn test_respond_updates_membership() {
        let hub = Hub::new(HubSettings::default());
        let (id, _rx) = hub
            .connect(
                ConnectionInfo {
                    user_id: "k1".into(),
                    role: Role::Kitchen,
                },
                [],
            )
            .await;

        let reply = respond(&hub, id, ClientMessage::Subscribe { room: Room::Kitchen }).await;
        assert_eq!(reply, ServerMessage::Subscribed { room: Room::Kitchen });
        assert_eq!(hub.members(Room::Kitchen).await, vec![id]);

        let reply = respond(&hub, id, ClientMessage::Unsubscribe { room: Room::Kitchen }).await;
        assert_eq!(reply, ServerMessage::Unsubscribed { room: Room::Kitchen });
        assert!(hub.members(Room::Kitchen).await.is_empty());

        assert_eq!(respond(&hub, id, ClientMessage::Ping).await, ServerMessage::Pong);
    }

    #[tokio::test]
    async fn test_respond_after_disconnect() {
        let hub = Hub::new(HubSettings::default());
        let reply = respond(&hub, 42, ClientMessage::Subscribe { room: Room::Pos }).await;
        assert!(matches!(reply, ServerMessage::Error { ref code, .. } if code == "disconnected"));
    }
}
