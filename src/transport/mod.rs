//! Publish/subscribe transport seam
//!
//! A session never talks to a broker directly. A [`Connector`] opens a
//! [`Connection`], which splits into a shareable [`Transport`] handle used by
//! callers and the delivery loop, and an [`EventStream`] drained by exactly one
//! delivery loop.

mod mqtt;

pub use mqtt::{MqttConfig, MqttConnector};
pub use rumqttc::QoS;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Something the broker told us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker acknowledged the connection
    Connected,
    /// A message arrived on a subscribed topic
    Message { topic: String, payload: Vec<u8> },
    /// The connection is gone, no further events follow
    Disconnected,
}

/// Outbound half of a broker connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload, optionally as the topic's retained message
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;

    async fn subscribe(&self, filter: &str) -> Result<()>;

    async fn unsubscribe(&self, filter: &str) -> Result<()>;

    /// Ask the broker to close the connection
    async fn disconnect(&self) -> Result<()>;
}

/// Inbound half of a broker connection
#[async_trait]
pub trait EventStream: Send {
    /// Next event in delivery order, `None` once the connection has ended
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// An opened, not yet acknowledged, broker connection
pub struct Connection {
    pub transport: Arc<dyn Transport>,
    pub events: Box<dyn EventStream>,
}

/// Opens broker connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, client_id: &str, host: &str, port: u16) -> Result<Connection>;
}
