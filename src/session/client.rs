//! DAB session implementation

use crate::error::{DabError, Result};
use crate::session::config::SessionConfig;
use crate::session::dispatch::{Dispatch, Dispatcher, RequestHandler, RetainedMessage};
use crate::session::registry::{CorrelationRegistry, PendingResponse};
use crate::topics;
use crate::transport::{Connector, EventStream, Transport, TransportEvent};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound for the best-effort disconnect when tearing down a failed connection
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected to the broker
    Disconnected,
    /// Waiting for the broker to acknowledge the connection
    Connecting,
    /// Connected, request filters subscribed and retained messages published
    Connected,
}

/// Collects the fixed handler and retained-message sets of a session
pub struct SessionBuilder {
    config: SessionConfig,
    handlers: Vec<RequestHandler>,
    retained: Vec<RetainedMessage>,
}

impl SessionBuilder {
    /// Register a request handler
    pub fn handler(mut self, handler: RequestHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(mut self, handlers: impl IntoIterator<Item = RequestHandler>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Add a message to publish with the retain flag on every connection
    pub fn retain(mut self, message: RetainedMessage) -> Self {
        self.retained.push(message);
        self
    }

    /// Validate the configuration and handler topics and build the session
    pub fn build<C: Connector + 'static>(self, connector: C) -> Result<DabSession> {
        self.build_with(Arc::new(connector))
    }

    pub fn build_with(self, connector: Arc<dyn Connector>) -> Result<DabSession> {
        self.config.validate()?;

        let registry = CorrelationRegistry::new();
        let dispatcher = Dispatcher::new(self.handlers, registry.clone())?;
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let inner = Arc::new(SessionInner {
            config: self.config,
            connector,
            dispatcher,
            retained: self.retained,
            registry,
            state: state_tx,
            state_rx,
            transport: Mutex::new(None),
            event_loop: Mutex::new(None),
            generation: AtomicU64::new(0),
            started: AtomicBool::new(false),
        });

        Ok(DabSession { inner })
    }
}

/// Internal session state
struct SessionInner {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    retained: Vec<RetainedMessage>,
    registry: CorrelationRegistry,

    state: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,

    // Outbound half of the current connection
    transport: Mutex<Option<Arc<dyn Transport>>>,

    // Delivery loop of the current connection
    event_loop: Mutex<Option<JoinHandle<()>>>,

    // Bumped per connection so a stale delivery loop cannot touch session state
    generation: AtomicU64,

    // Set once connect has been called
    started: AtomicBool,
}

/// A DAB participant on a publish/subscribe broker
///
/// Answers requests on its registered handler topics, announces its retained
/// messages on every connection, and issues requests to other participants as
/// if they were synchronous calls. Cheaply cloneable; clones share the connection.
#[derive(Clone)]
pub struct DabSession {
    inner: Arc<SessionInner>,
}

impl DabSession {
    /// Start building a session with the given configuration
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            handlers: Vec::new(),
            retained: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.inner.config.client_id
    }

    /// Get the current connection state
    pub fn state(&self) -> SessionState {
        *self.inner.state_rx.borrow()
    }

    /// Get a receiver for connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.inner.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Number of requests currently awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.inner.registry.len()
    }

    /// Connect to the broker and wait for its acknowledgment.
    ///
    /// On acknowledgment every handler filter is subscribed and every retained
    /// message published before this returns.
    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(DabError::AlreadyConnected);
        }

        let client_id = self.inner.config.client_id.as_str();
        info!(host, port, client_id, "Connecting to the MQTT broker");

        let connection = match self.inner.connector.connect(client_id, host, port).await {
            Ok(connection) => connection,
            Err(e) => {
                self.inner.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.inner.transport.lock() = Some(connection.transport.clone());
        self.inner.started.store(true, Ordering::SeqCst);

        let mut state_rx = self.inner.state.subscribe();

        let handle = tokio::spawn(run_event_loop(
            self.inner.clone(),
            generation,
            connection.transport,
            connection.events,
        ));
        *self.inner.event_loop.lock() = Some(handle);

        let connect_timeout = self.inner.config.connect_timeout;
        match timeout(connect_timeout, wait_for_connected(&mut state_rx)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(client_id, timeout = ?connect_timeout, "Broker did not acknowledge the connection");
                self.inner.teardown().await;
                Err(DabError::ConnectTimeout(connect_timeout))
            }
        }
    }

    /// Disconnect from the broker and wait for the delivery loop to stop
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(DabError::NotConnected);
        }

        let transport = self
            .inner
            .transport
            .lock()
            .clone()
            .ok_or(DabError::NotConnected)?;

        info!(client_id = %self.inner.config.client_id, "Disconnecting...");
        match timeout(self.inner.config.connect_timeout, transport.disconnect()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Disconnect was not accepted by the transport, tearing down");
                self.inner.teardown().await;
                return Ok(());
            }
        }

        let handle = self.inner.event_loop.lock().take();
        if let Some(mut handle) = handle {
            match timeout(self.inner.config.connect_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "Delivery loop ended abnormally");
                    self.inner.teardown().await;
                }
                Err(_) => {
                    warn!("Delivery loop did not stop after disconnect, aborting it");
                    handle.abort();
                    self.inner.teardown().await;
                }
            }
        }

        Ok(())
    }

    /// Wait until the session is disconnected
    pub async fn wait(&self) -> Result<()> {
        if !self.inner.started.load(Ordering::SeqCst) {
            return Err(DabError::NotConnected);
        }

        let mut state_rx = self.inner.state.subscribe();
        loop {
            if *state_rx.borrow_and_update() == SessionState::Disconnected {
                return Ok(());
            }
            if state_rx.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    /// Send a request using the default request timeout
    pub async fn request<Req, Res>(&self, topic: &str, payload: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.request_with_timeout(topic, payload, self.inner.config.request_timeout)
            .await
    }

    /// Send a request and wait for its response.
    ///
    /// A fresh correlation id is appended to `topic`; the response is expected
    /// on `_response/<topic>/<id>`. The response subscription and the registry
    /// entry are gone by the time this returns, whatever the outcome.
    pub async fn request_with_timeout<Req, Res>(
        &self,
        topic: &str,
        payload: &Req,
        request_timeout: Duration,
    ) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        info!(topic, "Request");

        let transport = self.inner.connected_transport()?;
        topics::validate_base_topic(topic)?;
        let body = serde_json::to_vec(payload)?;

        let request_topic = topics::request_topic(topic, &Uuid::new_v4().to_string());
        let response_topic = topics::response_topic(&request_topic);
        let mut pending = self.inner.registry.register(&response_topic)?;
        let subscription = ResponseSubscription::new(transport.clone(), &response_topic);

        let result = exchange(
            transport.as_ref(),
            &mut pending,
            topic,
            &request_topic,
            body,
            request_timeout,
        )
        .await;

        subscription.release().await;
        drop(pending);

        let response = result?;
        let decoded = serde_json::from_slice(&response)?;
        debug!(topic, "Response received");

        Ok(decoded)
    }
}

/// Unsubscribes a response topic when the request ends, even if the request
/// future is dropped before it completes.
struct ResponseSubscription {
    transport: Arc<dyn Transport>,
    topic: String,
    active: bool,
}

impl ResponseSubscription {
    fn new(transport: Arc<dyn Transport>, topic: &str) -> Self {
        Self {
            transport,
            topic: topic.to_string(),
            active: true,
        }
    }

    async fn release(mut self) {
        let result = self.transport.unsubscribe(&self.topic).await;
        self.active = false;

        if let Err(e) = result {
            debug!(topic = %self.topic, error = %e, "Failed to unsubscribe response topic");
        }
    }
}

impl Drop for ResponseSubscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(topic = %self.topic, "No runtime left to unsubscribe response topic");
            return;
        };

        let transport = self.transport.clone();
        let topic = std::mem::take(&mut self.topic);
        debug!(topic = %topic, "Request abandoned, unsubscribing response topic");
        runtime.spawn(async move {
            if let Err(e) = transport.unsubscribe(&topic).await {
                debug!(topic = %topic, error = %e, "Failed to unsubscribe response topic");
            }
        });
    }
}

/// Subscribe to the response topic, publish the request and wait for the reply
async fn exchange(
    transport: &dyn Transport,
    pending: &mut PendingResponse,
    topic: &str,
    request_topic: &str,
    body: Vec<u8>,
    request_timeout: Duration,
) -> Result<Vec<u8>> {
    debug!(topic = %pending.topic(), "Awaiting response");
    transport.subscribe(pending.topic()).await?;

    debug!(topic = request_topic, "Publishing request");
    transport.publish(request_topic, body, false).await?;

    match timeout(request_timeout, pending.recv()).await {
        Ok(result) => result,
        Err(_) => Err(DabError::RequestTimeout(topic.to_string())),
    }
}

async fn wait_for_connected(state_rx: &mut watch::Receiver<SessionState>) -> Result<()> {
    loop {
        match *state_rx.borrow_and_update() {
            SessionState::Connected => return Ok(()),
            SessionState::Disconnected => {
                return Err(DabError::Transport("Unable to connect to the broker".into()));
            }
            SessionState::Connecting => {}
        }

        if state_rx.changed().await.is_err() {
            return Err(DabError::NotConnected);
        }
    }
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        let _ = self.state.send_replace(state);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn connected_transport(&self) -> Result<Arc<dyn Transport>> {
        if *self.state_rx.borrow() != SessionState::Connected {
            return Err(DabError::NotConnected);
        }

        self.transport.lock().clone().ok_or(DabError::NotConnected)
    }

    async fn on_connected(&self, generation: u64, transport: &dyn Transport) {
        info!(client_id = %self.config.client_id, "Connected to the MQTT broker");

        for filter in self.dispatcher.filters() {
            if let Err(e) = transport.subscribe(filter.as_str()).await {
                warn!(filter = %filter, error = %e, "Failed to subscribe request topic");
            }
        }

        for message in &self.retained {
            if let Err(e) = transport
                .publish(message.topic(), message.payload().to_vec(), true)
                .await
            {
                warn!(topic = message.topic(), error = %e, "Failed to publish retained message");
            }
        }

        if self.is_current(generation) {
            self.state.send_if_modified(|state| {
                if *state == SessionState::Connecting {
                    *state = SessionState::Connected;
                    true
                } else {
                    false
                }
            });
        }
    }

    async fn on_message(&self, transport: &dyn Transport, topic: &str, payload: &[u8]) {
        debug!(topic, bytes = payload.len(), "Message arrived");

        if let Dispatch::Reply(reply) = self.dispatcher.on_message(topic, payload) {
            if let Err(e) = transport.publish(&reply.topic, reply.payload, false).await {
                warn!(topic = %reply.topic, error = %e, "Failed to publish response");
            }
        }
    }

    fn on_disconnected(&self, generation: u64) {
        if !self.is_current(generation) {
            debug!(generation, "Stale delivery loop ended");
            return;
        }

        info!(client_id = %self.config.client_id, "MQTT broker disconnected");
        self.transport.lock().take();
        self.registry.abandon_all();
        self.set_state(SessionState::Disconnected);
    }

    /// Forcefully drop the current connection
    async fn teardown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.event_loop.lock().take() {
            handle.abort();
        }

        let transport = self.transport.lock().take();
        if let Some(transport) = transport {
            match timeout(TEARDOWN_TIMEOUT, transport.disconnect()).await {
                Ok(Err(e)) => debug!(error = %e, "Disconnect during teardown failed"),
                Err(_) => debug!("Disconnect during teardown timed out"),
                Ok(Ok(())) => {}
            }
        }

        self.registry.abandon_all();
        self.set_state(SessionState::Disconnected);
    }
}

/// Drives one connection: every inbound event is handled here, in delivery order
async fn run_event_loop(
    inner: Arc<SessionInner>,
    generation: u64,
    transport: Arc<dyn Transport>,
    mut events: Box<dyn EventStream>,
) {
    while let Some(event) = events.next_event().await {
        match event {
            TransportEvent::Connected => inner.on_connected(generation, transport.as_ref()).await,
            TransportEvent::Message { topic, payload } => {
                inner.on_message(transport.as_ref(), &topic, &payload).await
            }
            TransportEvent::Disconnected => break,
        }
    }

    inner.on_disconnected(generation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use serde_json::{json, Value};

    fn session(broker: &MemoryBroker, client_id: &str) -> DabSession {
        DabSession::builder(SessionConfig::new(client_id))
            .handler(RequestHandler::new("dab/health-check/get", |_, _| {
                Ok(json!({"status": 200, "healthy": true}))
            }))
            .build(broker.clone())
            .unwrap()
    }

    #[test]
    fn test_session_initial_state() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "device");

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert_eq!(session.client_id(), "device");
        assert_eq!(session.pending_requests(), 0);
    }

    #[test]
    fn test_state_receiver() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "device");

        let rx = session.state_receiver();
        assert_eq!(*rx.borrow(), SessionState::Disconnected);
    }

    #[test]
    fn test_build_rejects_invalid_client_id() {
        let result = DabSession::builder(SessionConfig::new("")).build(MemoryBroker::new());
        assert!(matches!(result, Err(DabError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_disconnect() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "device");

        session.connect("localhost", 1883).await.unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(broker.subscriptions("device"), vec!["dab/health-check/get/+"]);

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "device");

        session.connect("localhost", 1883).await.unwrap();
        assert!(matches!(
            session.connect("localhost", 1883).await,
            Err(DabError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn test_request_not_connected() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "controller");

        let result: Result<Value> = session.request("dab/health-check/get", &json!({})).await;
        assert!(matches!(result, Err(DabError::NotConnected)));
    }

    #[tokio::test]
    async fn test_request_rejects_trailing_separator() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "controller");
        session.connect("localhost", 1883).await.unwrap();

        let result: Result<Value> = session.request("dab/health-check/get/", &json!({})).await;
        assert!(matches!(result, Err(DabError::InvalidTopic(_))));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "device");

        assert!(matches!(session.disconnect().await, Err(DabError::NotConnected)));
    }

    #[tokio::test]
    async fn test_wait_before_connect_fails() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "device");

        assert!(matches!(session.wait().await, Err(DabError::NotConnected)));
    }

    #[tokio::test]
    async fn test_request_to_self() {
        let broker = MemoryBroker::new();
        let session = session(&broker, "loopback");
        session.connect("localhost", 1883).await.unwrap();

        let response: Value = session.request("dab/health-check/get", &json!({})).await.unwrap();
        assert_eq!(response, json!({"status": 200, "healthy": true}));
        assert_eq!(session.pending_requests(), 0);
    }
}
