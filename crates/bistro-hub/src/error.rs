//! # Hub Error Types
//!
//! Errors stay inside the hub: publishers never see them. They are logged
//! and, for client mistakes, echoed back as an `error` frame.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Hub Error Categories                              │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │   Delivery      │  │   Protocol      │  │   Configuration         │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  QueueFull      │  │  InvalidMessage │  │  InvalidConfig          │  │
//! │  │  Disconnected   │  │  Serialization  │  │                         │  │
//! │  │  WriteTimeout   │  │                 │  │                         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::registry::ConnectionId;

/// Result type alias for hub operations.
pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    // =========================================================================
    // Delivery Errors
    // =========================================================================
    /// The connection's outbound queue is full; it has been dropped.
    #[error("Outbound queue full for connection {0}")]
    QueueFull(ConnectionId),

    /// The connection is gone (closed or never existed).
    #[error("Connection {0} is not connected")]
    Disconnected(ConnectionId),

    /// A socket write exceeded the write timeout.
    #[error("Write timed out after {0} ms")]
    WriteTimeout(u64),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Client sent a frame we can't understand.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Failed to serialize a frame.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid hub configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::SerializationFailed(err.to_string())
    }
}

impl From<axum::Error> for HubError {
    fn from(err: axum::Error) -> Self {
        HubError::WebSocket(err.to_string())
    }
}

impl HubError {
    /// Short code sent to clients in `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::QueueFull(_) => "queue_full",
            HubError::Disconnected(_) => "disconnected",
            HubError::WriteTimeout(_) => "write_timeout",
            HubError::WebSocket(_) => "websocket_error",
            HubError::InvalidMessage(_) => "invalid_message",
            HubError::SerializationFailed(_) => "serialization_failed",
            HubError::InvalidConfig(_) => "invalid_config",
        }
    }

    /// True when the connection must be dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HubError::QueueFull(_)
                | HubError::Disconnected(_)
                | HubError::WriteTimeout(_)
                | HubError::WebSocket(_)
        )
    }
}
