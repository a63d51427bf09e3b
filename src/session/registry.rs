//! In-flight request bookkeeping
//!
//! Every outstanding request owns exactly one entry, keyed by the response
//! topic it expects. The entry lives as long as the [`PendingResponse`] guard
//! held by the requesting call, so it cannot outlive that call on any exit path.

use crate::error::{DabError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

struct InFlightRequest {
    /// Taken on first resolution; later duplicates are consumed and dropped
    signal: Option<oneshot::Sender<Vec<u8>>>,
}

/// Thread-safe table of in-flight requests
#[derive(Clone, Default)]
pub struct CorrelationRegistry {
    entries: Arc<Mutex<HashMap<String, InFlightRequest>>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request expecting its response on `response_topic`
    pub fn register(&self, response_topic: &str) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();

        {
            let mut entries = self.entries.lock();
            if entries.contains_key(response_topic) {
                return Err(DabError::DuplicateCorrelation(response_topic.to_string()));
            }
            entries.insert(
                response_topic.to_string(),
                InFlightRequest { signal: Some(tx) },
            );
        }

        Ok(PendingResponse {
            topic: response_topic.to_string(),
            rx,
            registry: self.clone(),
        })
    }

    /// Hand an inbound message to the request waiting for it.
    ///
    /// Returns false when no request expects this topic.
    pub fn resolve(&self, topic: &str, payload: &[u8]) -> bool {
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(topic) else {
            return false;
        };

        match entry.signal.take() {
            Some(tx) => {
                // The waiter may have just timed out; the entry goes with its guard
                let _ = tx.send(payload.to_vec());
            }
            None => debug!(topic, "Dropping duplicate response"),
        }

        true
    }

    /// Remove an entry, resolved or not. Idempotent.
    pub fn remove(&self, response_topic: &str) -> bool {
        self.entries.lock().remove(response_topic).is_some()
    }

    /// Wake every waiter with a closed signal, e.g. after the connection dropped
    pub fn abandon_all(&self) {
        for entry in self.entries.lock().values_mut() {
            entry.signal = None;
        }
    }

    pub fn contains(&self, response_topic: &str) -> bool {
        self.entries.lock().contains_key(response_topic)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Handle to one registered request; removes its entry on drop
pub struct PendingResponse {
    topic: String,
    rx: oneshot::Receiver<Vec<u8>>,
    registry: CorrelationRegistry,
}

impl PendingResponse {
    /// The response topic this request waits on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the raw response payload
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        (&mut self.rx)
            .await
            .map_err(|_| DabError::ConnectionLost(self.topic.clone()))
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.registry.remove(&self.topic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = CorrelationRegistry::new();
        let mut pending = registry.register("_response/dab/x/1").unwrap();

        assert!(registry.resolve("_response/dab/x/1", b"{\"status\":200}"));
        assert_eq!(pending.recv().await.unwrap(), b"{\"status\":200}".to_vec());
    }

    #[test]
    fn test_resolve_unknown_topic_falls_through() {
        let registry = CorrelationRegistry::new();
        let _pending = registry.register("_response/dab/x/1").unwrap();

        assert!(!registry.resolve("_response/dab/x/2", b"{}"));
        assert!(!registry.resolve("dab/x/1", b"{}"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = CorrelationRegistry::new();
        let _pending = registry.register("_response/dab/x/1").unwrap();

        assert!(matches!(
            registry.register("_response/dab/x/1"),
            Err(DabError::DuplicateCorrelation(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_response_is_still_consumed() {
        let registry = CorrelationRegistry::new();
        let _pending = registry.register("_response/dab/x/1").unwrap();

        assert!(registry.resolve("_response/dab/x/1", b"first"));
        assert!(registry.resolve("_response/dab/x/1", b"second"));
    }

    #[test]
    fn test_drop_removes_entry() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register("_response/dab/x/1").unwrap();
        assert!(registry.contains("_response/dab/x/1"));

        drop(pending);
        assert!(registry.is_empty());
        assert!(!registry.resolve("_response/dab/x/1", b"{}"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register("_response/dab/x/1").unwrap();

        assert!(registry.remove(pending.topic()));
        assert!(!registry.remove(pending.topic()));
        drop(pending);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_abandon_all_wakes_waiters() {
        let registry = CorrelationRegistry::new();
        let mut pending = registry.register("_response/dab/x/1").unwrap();

        registry.abandon_all();

        let result = tokio::time::timeout(Duration::from_secs(1), pending.recv())
            .await
            .expect("waiter should be woken");
        assert!(matches!(result, Err(DabError::ConnectionLost(_))));
        assert!(registry.contains("_response/dab/x/1"));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_do_not_cross() {
        let registry = CorrelationRegistry::new();

        let mut handles = vec![];
        for i in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let topic = format!("_response/dab/x/{i}");
                let mut pending = registry.register(&topic).unwrap();
                assert!(registry.resolve(&topic, i.to_string().as_bytes()));
                let payload = pending.recv().await.unwrap();
                assert_eq!(payload, i.to_string().into_bytes());
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(registry.is_empty());
    }
}
