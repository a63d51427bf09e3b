//! Connection state management

use crate::topics::TopicFilter;
use crate::transport::TransportEvent;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A connected client
pub struct BrokerConnection {
    /// Unique connection ID
    pub id: Uuid,
    /// Client identity supplied at connect time
    pub client_id: String,
    /// Filters this client is subscribed to
    pub subscriptions: RwLock<HashSet<TopicFilter>>,
    /// Channel for delivering events to this client
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl BrokerConnection {
    pub fn new(client_id: impl Into<String>, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: client_id.into(),
            subscriptions: RwLock::new(HashSet::new()),
            tx,
        }
    }

    /// Add a subscription, returns false if it already existed
    pub fn subscribe(&self, filter: TopicFilter) -> bool {
        self.subscriptions.write().insert(filter)
    }

    /// Remove a subscription, returns false if it did not exist
    pub fn unsubscribe(&self, filter: &str) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|f| f.as_str() != filter);
        subscriptions.len() != before
    }

    /// Check if this connection should receive a message on the given topic
    pub fn should_receive(&self, topic: &str) -> bool {
        self.subscriptions.read().iter().any(|f| f.matches(topic))
    }

    /// Current subscriptions, sorted
    pub fn subscription_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self
            .subscriptions
            .read()
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        list.sort();
        list
    }

    /// Send an event to this client
    pub fn send(&self, event: TransportEvent) -> Result<(), mpsc::error::SendError<TransportEvent>> {
        self.tx.send(event)
    }
}

/// Manages all active connections
#[derive(Clone)]
pub struct ConnectionManager {
    /// All active connections by ID
    connections: Arc<DashMap<Uuid, Arc<BrokerConnection>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Register a new connection
    pub fn add(&self, conn: Arc<BrokerConnection>) {
        self.connections.insert(conn.id, conn);
    }

    /// Remove a connection
    pub fn remove(&self, id: Uuid) -> Option<Arc<BrokerConnection>> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    /// Is this connection still registered?
    pub fn contains(&self, id: Uuid) -> bool {
        self.connections.contains_key(&id)
    }

    /// Find all connections that should receive a message on the given topic
    pub fn find_subscribers(&self, topic: &str) -> Vec<Arc<BrokerConnection>> {
        self.connections
            .iter()
            .filter(|entry| entry.value().should_receive(topic))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Get connections by client ID
    pub fn find_by_client_id(&self, client_id: &str) -> Vec<Arc<BrokerConnection>> {
        self.connections
            .iter()
            .filter(|entry| entry.value().client_id == client_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Get total connection count
    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_subscribe_and_receive() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = BrokerConnection::new("device-1", tx);

        assert!(conn.subscribe(TopicFilter::parse("dab/system/restart/+").unwrap()));
        assert!(!conn.subscribe(TopicFilter::parse("dab/system/restart/+").unwrap()));

        assert!(conn.should_receive("dab/system/restart/abc"));
        assert!(!conn.should_receive("dab/system/restart"));
        assert!(!conn.should_receive("dab/applications/list/abc"));
    }

    #[test]
    fn test_connection_unsubscribe() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = BrokerConnection::new("device-1", tx);
        conn.subscribe(TopicFilter::parse("dab/#").unwrap());

        assert!(conn.unsubscribe("dab/#"));
        assert!(!conn.unsubscribe("dab/#"));
        assert!(!conn.should_receive("dab/version"));
        assert!(conn.subscription_list().is_empty());
    }

    #[test]
    fn test_manager_find_subscribers() {
        let manager = ConnectionManager::new();

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let conn1 = Arc::new(BrokerConnection::new("a", tx1));
        conn1.subscribe(TopicFilter::parse("dab/+").unwrap());

        let (tx2, _rx2) = mpsc::unbounded_channel();
        let conn2 = Arc::new(BrokerConnection::new("b", tx2));
        conn2.subscribe(TopicFilter::parse("other/#").unwrap());

        manager.add(conn1.clone());
        manager.add(conn2.clone());

        let subscribers = manager.find_subscribers("dab/version");
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].id, conn1.id);

        assert_eq!(manager.find_by_client_id("b").len(), 1);
        assert!(manager.remove(conn2.id).is_some());
        assert!(!manager.contains(conn2.id));
        assert_eq!(manager.count(), 1);
    }
}
