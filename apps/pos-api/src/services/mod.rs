//! Services behind the routes.
//!
//! - [`order_service`] - [`OrderEngine`]: order/table operations + event publishing
//! - [`outbound`] - [`OutboundQueue`]: receipt delivery off the request path

pub mod order_service;
pub mod outbound;

pub use order_service::OrderEngine;
pub use outbound::OutboundQueue;
