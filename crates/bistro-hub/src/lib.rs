//! # bistro-hub: Notification Hub for Bistro POS
//!
//! Room-based pub/sub for live clients. Request handlers publish typed
//! [`NotificationEvent`](bistro_core::NotificationEvent)s after their store
//! transaction commits; the hub fans them out to every connection whose rooms
//! the event targets.
//!
//! ## Delivery Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  publish()         never blocks on a client, never returns an error     │
//! │  per connection    FIFO (single writer task)                            │
//! │  across clients    no ordering                                          │
//! │  failure           queue full / closed / write error / write timeout    │
//! │                    → connection dropped from all rooms, no retry        │
//! │  room "all"        every live connection, regardless of membership      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`registry`] - [`Hub`]: connections, rooms, bounded queues, publish
//! - [`server`] - axum WebSocket session loop
//! - [`protocol`] - client/server control frames
//! - [`config`] - [`HubSettings`]
//! - [`error`] - [`HubError`]

pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use config::HubSettings;
pub use error::{HubError, HubResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{ConnectionId, ConnectionInfo, ConnectionSummary, Frame, Hub};
pub use server::serve_socket;
