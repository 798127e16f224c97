//! # Outbound Messaging
//!
//! Receipts sent to guests after their order completes.
//!
//! ## Delivery Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderEngine::transition(.., Completed)                                 │
//! │       │ after commit                                                    │
//! │       ▼                                                                 │
//! │  OutboundQueue::queue_receipt(order)    try_send, never awaits          │
//! │       │            └── queue full → warn!, message dropped              │
//! │       ▼                                                                 │
//! │  bounded mpsc (outbound.queue_capacity)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  worker task ──► Courier::deliver()                                     │
//! │                    ├── WhatsAppCourier (HTTP POST, timeout)             │
//! │                    └── LogCourier (no API configured)                   │
//! │                  failure → warn!, no retry                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bistro_core::{ItemStatus, Money, Order};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OutboundConfig;

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WhatsApp,
}

/// A formatted payload and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: Channel,
    /// Phone number for WhatsApp.
    pub to: String,
    pub body: String,
    /// Order number, for log correlation.
    pub reference: String,
}

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider rejected message with status {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for OutboundError {
    fn from(err: reqwest::Error) -> Self {
        OutboundError::Http(err.to_string())
    }
}

// =============================================================================
// Couriers
// =============================================================================

/// Delivers one message. Implementations must not retry.
pub trait Courier: Send + Sync + 'static {
    fn deliver(
        &self,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<(), OutboundError>> + Send;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogCourier;

impl Courier for LogCourier {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), OutboundError> {
        info!(
            channel = ?message.channel,
            to = %message.to,
            reference = %message.reference,
            "Outbound message (no provider configured)"
        );
        debug!(body = %message.body, "Outbound body");
        Ok(())
    }
}

/// Posts `{"to", "message"}` to a WhatsApp gateway.
pub struct WhatsAppCourier {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl WhatsAppCourier {
    pub fn new(api_url: String, token: Option<String>, timeout: Duration) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(WhatsAppCourier {
            client,
            api_url,
            token,
        })
    }
}

impl Courier for WhatsAppCourier {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), OutboundError> {
        let mut request = self
            .client
            .post(&self.api_url)
            .json(&json!({ "to": message.to, "message": message.body }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(OutboundError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

// =============================================================================
// Queue
// =============================================================================

/// Handle used by request handlers. Cheap to clone.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<OutboundMessage>,
    restaurant_name: Arc<str>,
}

impl OutboundQueue {
    /// Creates the queue. The receiver goes to [`spawn_worker`].
    pub fn new(capacity: usize, restaurant_name: &str) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let queue = OutboundQueue {
            tx,
            restaurant_name: Arc::from(restaurant_name),
        };
        (queue, rx)
    }

    /// Creates the queue and starts a worker with the configured courier.
    pub fn start(config: &OutboundConfig) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::new(config.queue_capacity, &config.restaurant_name);

        let worker = match &config.whatsapp_api_url {
            Some(url) => match WhatsAppCourier::new(
                url.clone(),
                config.whatsapp_api_token.clone(),
                config.timeout(),
            ) {
                Ok(courier) => {
                    info!(api_url = %url, "WhatsApp receipts enabled");
                    spawn_worker(courier, rx)
                }
                Err(e) => {
                    warn!(error = %e, "WhatsApp client setup failed, receipts will be logged");
                    spawn_worker(LogCourier, rx)
                }
            },
            None => spawn_worker(LogCourier, rx),
        };
        (queue, worker)
    }

    /// Queues without waiting. Returns false if the message was dropped.
    pub fn enqueue(&self, message: OutboundMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(reference = %message.reference, "Outbound queue full, message dropped");
                false
            }
            Err(TrySendError::Closed(message)) => {
                warn!(reference = %message.reference, "Outbound worker stopped, message dropped");
                false
            }
        }
    }

    /// Queues a WhatsApp receipt if the guest left a phone number.
    pub fn queue_receipt(&self, order: &Order) -> bool {
        let Some(phone) = order
            .customer_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            return false;
        };

        self.enqueue(OutboundMessage {
            channel: Channel::WhatsApp,
            to: phone.to_string(),
            body: format_receipt(order, &self.restaurant_name),
            reference: order.order_number.clone(),
        })
    }
}

/// Drains the queue until every [`OutboundQueue`] handle is dropped.
pub fn spawn_worker<C: Courier>(
    courier: C,
    mut rx: mpsc::Receiver<OutboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match courier.deliver(&message).await {
                Ok(()) => debug!(reference = %message.reference, "Outbound message delivered"),
                Err(e) => warn!(
                    reference = %message.reference,
                    to = %message.to,
                    error = %e,
                    "Outbound delivery failed"
                ),
            }
        }
        debug!("Outbound worker stopped");
    })
}

// =============================================================================
// Formatting
// =============================================================================

/// Plain-text receipt for chat delivery.
pub fn format_receipt(order: &Order, restaurant_name: &str) -> String {
    let totals = order.totals();
    let mut out = String::new();

    let _ = writeln!(out, "*{}*", restaurant_name);
    let _ = writeln!(out);
    let _ = writeln!(out, "Order #{}", order.order_number);
    let _ = writeln!(out, "{}", order.created_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out);

    for item in order.items.iter().filter(|i| i.status != ItemStatus::Cancelled) {
        let _ = writeln!(out, "- {} x{}  {}", item.menu_item_name, item.quantity, item.line_total());
        for modifier in &item.modifiers {
            let _ = writeln!(
                out,
                "    + {} {}",
                modifier.name,
                Money::from_cents(modifier.price_delta_cents)
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Subtotal: {}", totals.subtotal);
    let _ = writeln!(out, "Tax: {}", totals.tax);
    let _ = writeln!(out, "Service: {}", totals.service_charge);
    if totals.discount.is_positive() {
        let _ = writeln!(out, "Discount: -{}", totals.discount);
    }
    let _ = writeln!(out, "*Total: {}*", totals.total);
    let _ = writeln!(out);
    let _ = write!(out, "Thank you for dining with us!");
    out
}
