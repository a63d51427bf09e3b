//! Inbound message dispatch
//!
//! Every inbound message is first offered to the correlation registry (is it a
//! response we are waiting for?). Anything else is matched against the
//! registered request handlers and answered on `_response/<request topic>`.

use crate::error::{DabError, HandlerError, HandlerResult, Result};
use crate::session::messages::ErrorResponse;
use crate::session::registry::CorrelationRegistry;
use crate::topics::{self, TopicFilter};

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Handler invoked with the concrete request topic and the decoded payload
pub type HandlerFn = Arc<dyn Fn(&str, serde_json::Value) -> HandlerResult + Send + Sync>;

/// A command accepting requests on `topic/<correlation>`
#[derive(Clone)]
pub struct RequestHandler {
    topic: String,
    handler: HandlerFn,
}

impl RequestHandler {
    /// Bind a handler to a base topic. The topic is validated when the session is built.
    pub fn new<F>(topic: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str, serde_json::Value) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            topic: topic.into(),
            handler: Arc::new(handler),
        }
    }

    /// The base topic
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// A message published with the retain flag every time a connection is established
#[derive(Debug, Clone)]
pub struct RetainedMessage {
    topic: String,
    payload: Vec<u8>,
}

impl RetainedMessage {
    pub fn new<T: Serialize + ?Sized>(topic: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_vec(payload)?,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A response to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// What became of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// It answered one of our in-flight requests
    Resolved,
    /// A handler ran and this reply must be published
    Reply(Reply),
    /// Nothing is interested in it
    Ignored,
}

struct Route {
    filter: TopicFilter,
    handler: HandlerFn,
}

/// Routes inbound messages to the registry or to request handlers
pub struct Dispatcher {
    routes: Vec<Route>,
    registry: CorrelationRegistry,
}

impl Dispatcher {
    /// Validate registrations and derive their filters.
    ///
    /// Base topics must be wildcard-free and must not end with `/`. Since every
    /// filter is `base/+`, two registrations can only overlap when their bases
    /// are equal, so duplicates are rejected too.
    pub fn new(handlers: Vec<RequestHandler>, registry: CorrelationRegistry) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(handlers.len());

        for handler in handlers {
            let filter = TopicFilter::for_requests(&handler.topic).map_err(|e| {
                DabError::Configuration(format!(
                    "request handler topic '{}' is invalid: {}",
                    handler.topic, e
                ))
            })?;

            if !seen.insert(handler.topic.clone()) {
                return Err(DabError::Configuration(format!(
                    "request handler topic '{}' is registered twice",
                    handler.topic
                )));
            }

            routes.push(Route {
                filter,
                handler: handler.handler,
            });
        }

        Ok(Self { routes, registry })
    }

    /// Filters to subscribe on every connection
    pub fn filters(&self) -> impl Iterator<Item = &TopicFilter> {
        self.routes.iter().map(|route| &route.filter)
    }

    /// Handle one inbound message
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> Dispatch {
        if self.registry.resolve(topic, payload) {
            debug!(topic, "Response matched an in-flight request");
            return Dispatch::Resolved;
        }

        let Some(route) = self.routes.iter().find(|route| route.filter.matches(topic)) else {
            debug!(topic, "No handler for topic, ignoring");
            return Dispatch::Ignored;
        };

        let body = invoke(route, topic, payload);
        let reply = Reply {
            topic: topics::response_topic(topic),
            payload: body,
        };

        debug!(topic = %reply.topic, "Responding");
        Dispatch::Reply(reply)
    }
}

/// Run a handler and encode whatever it produced as a response body
fn invoke(route: &Route, topic: &str, payload: &[u8]) -> Vec<u8> {
    let request: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(topic, error = %e, "Malformed request payload");
            return encode(&ErrorResponse::malformed_request());
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (route.handler)(topic, request)));

    match outcome {
        Ok(Ok(response)) => encode(&response),
        Ok(Err(HandlerError::Status { status, message })) => {
            warn!(topic, status, error = %message, "DAB error");
            encode(&ErrorResponse::new(status, message))
        }
        Ok(Err(HandlerError::Internal(e))) => {
            error!(topic, error = ?e, "Internal DAB error");
            encode(&ErrorResponse::internal())
        }
        Err(_) => {
            error!(topic, "Request handler panicked");
            encode(&ErrorResponse::internal())
        }
    }
}

fn encode<T: Serialize + ?Sized>(body: &T) -> Vec<u8> {
    match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            serde_json::to_vec(&ErrorResponse::internal()).unwrap_or_default()
        }
    }
}
