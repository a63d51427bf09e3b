//! In-process publish/subscribe broker
//!
//! Implements the transport seam without a network, with the broker semantics
//! sessions rely on: wildcard filters, retained messages delivered on
//! subscribe, and session takeover when a client identity reconnects.
//! Tests and local demos run sessions against it instead of a real MQTT broker.

mod connections;
mod router;

pub use connections::{BrokerConnection, ConnectionManager};
pub use router::TopicRouter;

use crate::error::{DabError, Result};
use crate::topics::TopicFilter;
use crate::transport::{Connection, Connector, EventStream, Transport, TransportEvent};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The in-process broker. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct MemoryBroker {
    connections: Arc<ConnectionManager>,
    router: TopicRouter,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let router = TopicRouter::new(connections.clone());

        Self {
            connections,
            router,
        }
    }

    /// Get the number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }

    /// Subscriptions held by every connection of a client identity
    pub fn subscriptions(&self, client_id: &str) -> Vec<String> {
        let mut list: Vec<String> = self
            .connections
            .find_by_client_id(client_id)
            .iter()
            .flat_map(|conn| conn.subscription_list())
            .collect();
        list.sort();
        list
    }

    /// Current retained payload for a topic
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.router.retained(topic)
    }

    /// Publish from outside any connection
    pub fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> usize {
        if retain {
            self.router.retain(topic, payload);
        }
        self.router.route(topic, payload)
    }

    /// Broker-initiated disconnect of every connection of a client identity
    pub fn drop_client(&self, client_id: &str) -> usize {
        let victims = self.connections.find_by_client_id(client_id);
        for conn in &victims {
            self.close(conn);
        }
        victims.len()
    }

    fn close(&self, conn: &BrokerConnection) {
        if self.connections.remove(conn.id).is_some() {
            let _ = conn.send(TransportEvent::Disconnected);
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryBroker {
    async fn connect(&self, client_id: &str, host: &str, port: u16) -> Result<Connection> {
        // Session takeover, as an MQTT broker does for a reused client identity
        let taken_over = self.drop_client(client_id);
        if taken_over > 0 {
            info!(client_id, "Client identity reconnected, closing previous connection");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(BrokerConnection::new(client_id, tx));
        debug!(client_id, host, port, connection_id = %conn.id, "In-process connection opened");

        let _ = conn.send(TransportEvent::Connected);
        self.connections.add(conn.clone());

        Ok(Connection {
            transport: Arc::new(BrokerLink {
                broker: self.clone(),
                conn,
            }),
            events: Box::new(BrokerEvents { rx, finished: false }),
        })
    }
}

/// Outbound half of an in-process connection
struct BrokerLink {
    broker: MemoryBroker,
    conn: Arc<BrokerConnection>,
}

impl BrokerLink {
    fn ensure_open(&self) -> Result<()> {
        if self.broker.connections.contains(self.conn.id) {
            Ok(())
        } else {
            Err(DabError::Transport("connection closed".into()))
        }
    }
}

#[async_trait]
impl Transport for BrokerLink {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.ensure_open()?;
        self.broker.publish(topic, &payload, retain);
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<()> {
        self.ensure_open()?;
        let filter = TopicFilter::parse(filter).map_err(|e| DabError::Transport(e.to_string()))?;

        if self.conn.subscribe(filter.clone()) {
            self.broker.router.deliver_retained(&self.conn, &filter);
        }

        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> Result<()> {
        self.ensure_open()?;
        self.conn.unsubscribe(filter);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.ensure_open()?;
        self.broker.close(&self.conn);
        Ok(())
    }
}

/// Inbound half of an in-process connection
struct BrokerEvents {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    finished: bool,
}

#[async_trait]
impl EventStream for BrokerEvents {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.finished {
            return None;
        }

        match self.rx.recv().await {
            Some(TransportEvent::Disconnected) | None => {
                self.finished = true;
                Some(TransportEvent::Disconnected)
            }
            Some(event) => Some(event),
        }
    }
}
