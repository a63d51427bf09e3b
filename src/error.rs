//! Error types for DAB sessions

use crate::topics::TopicError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when using a DAB session
#[derive(Error, Debug)]
pub enum DabError {
    /// Invalid session construction (handler topics, client identity)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A request topic failed validation
    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),

    /// Not currently connected to the broker
    #[error("Not connected to the broker")]
    NotConnected,

    /// A connect was attempted while a connection is in progress or established
    #[error("Already connected to the broker, disconnect first before reconnecting")]
    AlreadyConnected,

    /// The broker did not acknowledge the connection in time
    #[error("Unable to connect to the broker within {0:?}")]
    ConnectTimeout(Duration),

    /// No response arrived within the request timeout
    #[error("Operation timed out. Topic={0}")]
    RequestTimeout(String),

    /// Failed to serialize/deserialize a payload
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The underlying transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response topic was registered twice
    #[error("Response topic already in flight: {0}")]
    DuplicateCorrelation(String),

    /// The connection dropped while a response was pending
    #[error("Connection lost while awaiting response on {0}")]
    ConnectionLost(String),
}

/// Result type for DAB session operations
pub type Result<T> = std::result::Result<T, DabError>;

/// Failure raised by a request handler
///
/// `Status` is answered with its own code and message. Anything else is
/// answered with a generic internal error, never with its details.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(501, message)
    }
}

/// Result type returned by request handlers
pub type HandlerResult = std::result::Result<serde_json::Value, HandlerError>;
