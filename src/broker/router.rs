//! Topic routing, message fan-out and retained messages

use crate::broker::connections::{BrokerConnection, ConnectionManager};
use crate::topics::TopicFilter;
use crate::transport::TransportEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes messages to subscribed clients
#[derive(Clone)]
pub struct TopicRouter {
    connections: Arc<ConnectionManager>,
    /// Last retained payload per topic
    retained: Arc<DashMap<String, Vec<u8>>>,
}

impl TopicRouter {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self {
            connections,
            retained: Arc::new(DashMap::new()),
        }
    }

    /// Route a message to all subscribed clients, returns the number reached
    pub fn route(&self, topic: &str, payload: &[u8]) -> usize {
        let subscribers = self.connections.find_subscribers(topic);
        let count = subscribers.len();

        if count == 0 {
            debug!(topic, "No subscribers for topic");
            return 0;
        }

        debug!(topic, subscriber_count = count, "Routing message");

        for subscriber in subscribers {
            let event = TransportEvent::Message {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            };
            if let Err(e) = subscriber.send(event) {
                // Expected during rapid disconnect
                debug!(
                    connection_id = %subscriber.id,
                    error = %e,
                    "Failed to deliver message to subscriber"
                );
            }
        }

        count
    }

    /// Store (or with an empty payload, clear) a topic's retained message
    pub fn retain(&self, topic: &str, payload: &[u8]) {
        if payload.is_empty() {
            self.retained.remove(topic);
        } else {
            self.retained.insert(topic.to_string(), payload.to_vec());
        }
    }

    /// Deliver retained messages matching a freshly subscribed filter
    pub fn deliver_retained(&self, conn: &BrokerConnection, filter: &TopicFilter) -> usize {
        let mut delivered = 0;

        for entry in self.retained.iter() {
            if !filter.matches(entry.key()) {
                continue;
            }

            let event = TransportEvent::Message {
                topic: entry.key().clone(),
                payload: entry.value().clone(),
            };
            if conn.send(event).is_ok() {
                delivered += 1;
            }
        }

        delivered
    }

    /// Current retained payload for a topic
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.retained.get(topic).map(|entry| entry.value().clone())
    }
}
