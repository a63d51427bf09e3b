//! Error types for the DAB client

use dab_mqtt::DabError;
use thiserror::Error;

/// Errors that can occur when using the DAB client
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never got an answer (not connected, timeout, connection lost...)
    #[error(transparent)]
    Session(#[from] DabError),

    /// The device answered with a non-200 status
    #[error("Device error {status}: {message}")]
    Status { status: u16, message: String },

    /// The response did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Status code returned by the device, if it answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for DAB client operations
pub type Result<T> = std::result::Result<T, ClientError>;
