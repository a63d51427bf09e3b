//! MQTT transport built on rumqttc

use crate::error::{DabError, Result};
use crate::transport::{Connection, Connector, EventStream, Transport, TransportEvent};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Settings for the rumqttc client
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Interval between keepalive pings
    pub keep_alive: Duration,

    /// Quality of service for publishes and subscriptions
    pub qos: QoS,

    /// Capacity of the request queue between client handles and the event loop
    pub channel_capacity: usize,

    /// Start every connection with a fresh broker session
    pub clean_session: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(30),
            qos: QoS::ExactlyOnce,
            channel_capacity: 100,
            clean_session: true,
        }
    }
}

impl MqttConfig {
    /// Set the keepalive interval (zero disables keepalive, otherwise at least one second)
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }
}

/// Opens connections to an MQTT broker
#[derive(Debug, Clone, Default)]
pub struct MqttConnector {
    config: MqttConfig,
}

impl MqttConnector {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MqttConnector {
    async fn connect(&self, client_id: &str, host: &str, port: u16) -> Result<Connection> {
        if !self.config.keep_alive.is_zero() && self.config.keep_alive < Duration::from_secs(1) {
            return Err(DabError::Configuration(format!(
                "keep alive must be zero or at least one second, got {:?}",
                self.config.keep_alive
            )));
        }

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(self.config.clean_session);

        let (client, eventloop) = AsyncClient::new(options, self.config.channel_capacity.max(1));
        debug!(host, port, client_id, "MQTT client created");

        let (tx, rx) = mpsc::unbounded_channel();
        let poller = tokio::spawn(poll_event_loop(eventloop, tx));

        Ok(Connection {
            transport: Arc::new(MqttTransport {
                client,
                qos: self.config.qos,
            }),
            events: Box::new(MqttEvents {
                rx,
                poller,
                finished: false,
            }),
        })
    }
}

struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.client
            .publish(topic, self.qos, retain, payload)
            .await
            .map_err(|e| DabError::Transport(e.to_string()))
    }

    async fn subscribe(&self, filter: &str) -> Result<()> {
        self.client
            .subscribe(filter, self.qos)
            .await
            .map_err(|e| DabError::Transport(e.to_string()))
    }

    async fn unsubscribe(&self, filter: &str) -> Result<()> {
        self.client
            .unsubscribe(filter)
            .await
            .map_err(|e| DabError::Transport(e.to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| DabError::Transport(e.to_string()))
    }
}

/// Polls the rumqttc event loop and forwards what the session cares about.
///
/// Publishes queued by the session are only sent while `poll` runs, so the
/// poller never waits on whoever consumes the events. rumqttc reconnects on
/// the next poll after an error; we stop instead so that reconnecting stays
/// an explicit `connect` on the session.
async fn poll_event_loop(mut eventloop: EventLoop, tx: mpsc::UnboundedSender<TransportEvent>) {
    loop {
        let (event, last) = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!(code = ?ack.code, "Connection acknowledged");
                (TransportEvent::Connected, false)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => (
                TransportEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                },
                false,
            ),
            Ok(Event::Incoming(Packet::Disconnect)) | Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                (TransportEvent::Disconnected, true)
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "MQTT connection error");
                (TransportEvent::Disconnected, true)
            }
        };

        if tx.send(event).is_err() || last {
            break;
        }
    }

    debug!("MQTT event loop stopped");
}

/// Receives the events forwarded by the poller task
struct MqttEvents {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    poller: JoinHandle<()>,
    finished: bool,
}

#[async_trait]
impl EventStream for MqttEvents {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.finished {
            return None;
        }

        match self.rx.recv().await {
            Some(TransportEvent::Disconnected) | None => {
                self.finished = true;
                Some(TransportEvent::Disconnected)
            }
            event => event,
        }
    }
}

impl Drop for MqttEvents {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
