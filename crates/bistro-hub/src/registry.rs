//! # Connection Registry
//!
//! The only in-memory shared state of the server: live connections, their
//! rooms and their outbound queues.
//!
//! ## Fan-out
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Hub::publish(event)                             │
//! │                                                                         │
//! │  serialize once ──► Arc<str> frame                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read lock ── for each connection targeted by event.rooms:              │
//! │       │          try_send(frame)  (never awaits)                        │
//! │       │             ├── Ok          → delivered                         │
//! │       │             └── Full/Closed → mark dead                         │
//! │       ▼                                                                 │
//! │  write lock ── remove dead connections                                  │
//! │                                                                         │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐                             │
//! │  │ queue #1 │   │ queue #2 │   │ queue #3 │  bounded mpsc per client    │
//! │  └────┬─────┘   └────┬─────┘   └────┬─────┘                             │
//! │       ▼              ▼              ▼                                   │
//! │   writer task    writer task    writer task  (one per socket, FIFO)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Publishers never touch sockets and never wait on a slow client. Dropping a
//! connection drops its queue sender, which ends its writer task.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bistro_core::{NotificationEvent, Role, Room};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::HubSettings;
use crate::error::{HubError, HubResult};
use crate::protocol::ServerMessage;

/// Opaque connection identity, unique for the life of the hub.
pub type ConnectionId = u64;

/// A serialized frame shared by every recipient.
pub type Frame = Arc<str>;

/// Who is on the other end, as verified at upgrade time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug)]
struct Connection {
    info: ConnectionInfo,
    rooms: HashSet<Room>,
    tx: mpsc::Sender<Frame>,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Every connection is implicitly in `all`.
    fn receives(&self, event: &NotificationEvent) -> bool {
        event.rooms.contains(&Room::All) || self.rooms.iter().any(|room| event.targets(*room))
    }
}

/// Snapshot of one connection for diagnostics.
#[derive(Debug, Clone)]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub user_id: String,
    pub role: Role,
    pub rooms: Vec<Room>,
    pub connected_at: DateTime<Utc>,
}

/// The Notification Hub.
///
/// Shared as `Arc<Hub>` between request handlers (publishers) and socket
/// sessions.
#[derive(Debug)]
pub struct Hub {
    settings: HubSettings,
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Self {
        Hub {
            settings,
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Registers a connection with its initial rooms.
    ///
    /// Returns the receiving end of its outbound queue; the caller drains it
    /// onto the socket.
    pub async fn connect(
        &self,
        info: ConnectionInfo,
        rooms: impl IntoIterator<Item = Room>,
    ) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.settings.queue_capacity.max(1));
        let rooms: HashSet<Room> = rooms.into_iter().collect();

        info!(
            connection_id = id,
            user_id = %info.user_id,
            rooms = ?rooms,
            "Connection registered"
        );

        self.connections.write().await.insert(
            id,
            Connection {
                info,
                rooms,
                tx,
                connected_at: Utc::now(),
            },
        );
        (id, rx)
    }

    /// Adds `room` to the connection's set. Idempotent.
    pub async fn subscribe(&self, id: ConnectionId, room: Room) -> HubResult<()> {
        let mut connections = self.connections.write().await;
        let connection = connections.get_mut(&id).ok_or(HubError::Disconnected(id))?;
        if connection.rooms.insert(room) {
            debug!(connection_id = id, room = %room, "Subscribed");
        }
        Ok(())
    }

    /// Removes `room` from the connection's set. Idempotent.
    pub async fn unsubscribe(&self, id: ConnectionId, room: Room) -> HubResult<()> {
        let mut connections = self.connections.write().await;
        let connection = connections.get_mut(&id).ok_or(HubError::Disconnected(id))?;
        if connection.rooms.remove(&room) {
            debug!(connection_id = id, room = %room, "Unsubscribed");
        }
        Ok(())
    }

    /// Removes the connection from every room and closes its queue.
    ///
    /// Safe to call concurrently with `publish` and more than once.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&id);
        match removed {
            Some(connection) => {
                info!(
                    connection_id = id,
                    user_id = %connection.info.user_id,
                    "Connection removed"
                );
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Enqueues `event` for every targeted connection and returns how many
    /// accepted it. Never waits on a client.
    ///
    /// A connection whose queue is full or closed is dropped.
    pub async fn publish(&self, event: &NotificationEvent) -> usize {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(?e, kind = ?event.kind, "Failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let connections = self.connections.read().await;
            for (id, connection) in connections.iter() {
                if !connection.receives(event) {
                    continue;
                }
                match connection.tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(connection_id = *id, "Outbound queue full, dropping connection");
                        dead.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        for id in dead {
            self.disconnect(id).await;
        }

        debug!(
            kind = ?event.kind,
            action = %event.action,
            rooms = ?event.rooms,
            delivered,
            "Event published"
        );
        delivered
    }

    /// Enqueues a control frame for one connection.
    pub async fn send_to(&self, id: ConnectionId, message: &ServerMessage) -> HubResult<()> {
        let frame: Frame = message.to_json()?.into();

        let result = {
            let connections = self.connections.read().await;
            let connection = connections.get(&id).ok_or(HubError::Disconnected(id))?;
            connection.tx.try_send(frame)
        };

        match result {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.disconnect(id).await;
                Err(HubError::QueueFull(id))
            }
            Err(TrySendError::Closed(_)) => {
                self.disconnect(id).await;
                Err(HubError::Disconnected(id))
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Connections explicitly subscribed to `room`.
    pub async fn members(&self, room: Room) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        let mut ids: Vec<ConnectionId> = connections
            .iter()
            .filter(|(_, c)| room == Room::All || c.rooms.contains(&room))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub async fn connections(&self) -> Vec<ConnectionSummary> {
        let connections = self.connections.read().await;
        let mut list: Vec<ConnectionSummary> = connections
            .iter()
            .map(|(id, c)| ConnectionSummary {
                id: *id,
                user_id: c.info.user_id.clone(),
                role: c.info.role,
                rooms: c.rooms.iter().copied().collect(),
                connected_at: c.connected_at,
            })
            .collect();
        list.sort_by_key(|c| c.id);
        list
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
