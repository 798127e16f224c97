//! # Hub Settings
//!
//! Tuning knobs for the Notification Hub, read from the `[hub]` section of
//! `bistro.toml`.
//!
//! ```toml
//! [hub]
//! queue_capacity = 64        # frames buffered per connection
//! write_timeout_ms = 5000    # a socket write slower than this drops the client
//! ping_interval_secs = 30
//! max_message_size = 65536   # inbound frame limit (bytes)
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{HubError, HubResult};

/// Hub tuning. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Frames buffered per connection before it is considered stuck.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound for a single socket write (milliseconds).
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// Server ping interval (seconds).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Largest inbound client frame accepted (bytes).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_write_timeout() -> u64 {
    5_000
}

fn default_ping_interval() -> u64 {
    30
}

fn default_max_message_size() -> usize {
    64 * 1024
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            queue_capacity: default_queue_capacity(),
            write_timeout_ms: default_write_timeout(),
            ping_interval_secs: default_ping_interval(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl HubSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Rejects settings the hub can't run with.
    pub fn validate(&self) -> HubResult<()> {
        if self.queue_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(HubError::InvalidConfig(
                "write_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.ping_interval_secs == 0 {
            return Err(HubError::InvalidConfig(
                "ping_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
