//! Response envelope shared by every DAB command
//!
//! Responses always carry an integer `status`; failures add an `error` message.

use serde::{Deserialize, Serialize};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Message sent for any failure that is not a structured handler error
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal DAB error";

/// Message sent when a request payload is not JSON
pub const MALFORMED_REQUEST_MESSAGE: &str = "Request payload is not valid JSON";

/// Failure response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(STATUS_INTERNAL_ERROR, INTERNAL_ERROR_MESSAGE)
    }

    pub fn malformed_request() -> Self {
        Self::new(STATUS_BAD_REQUEST, MALFORMED_REQUEST_MESSAGE)
    }
}

/// The plain `{"status":200}` success body
pub fn ok() -> serde_json::Value {
    serde_json::json!({ "status": STATUS_OK })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&ErrorResponse::new(400, "bad")).unwrap();
        assert_eq!(json, r#"{"status":400,"error":"bad"}"#);
    }

    #[test]
    fn test_internal_error_response() {
        let json = serde_json::to_string(&ErrorResponse::internal()).unwrap();
        assert_eq!(json, r#"{"status":500,"error":"Internal DAB error"}"#);
    }

    #[test]
    fn test_error_response_deserialization() {
        let response: ErrorResponse =
            serde_json::from_str(r#"{"status":404,"error":"no such app"}"#).unwrap();
        assert_eq!(response, ErrorResponse::new(404, "no such app"));
    }

    #[test]
    fn test_ok_body() {
        assert_eq!(ok().to_string(), r#"{"status":200}"#);
    }
}
