//! Request parameter extraction

use crate::error::HandlerError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Extract a parameter that must be present
pub fn mandatory<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<T, HandlerError> {
    match payload.get(key) {
        Some(value) => decode(value, key),
        None => Err(HandlerError::bad_request(format!(
            "parameter {key} is mandatory"
        ))),
    }
}

/// Extract a parameter that may be absent
pub fn optional<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<Option<T>, HandlerError> {
    payload.get(key).map(|value| decode(value, key)).transpose()
}

fn decode<T: DeserializeOwned>(value: &Value, key: &str) -> Result<T, HandlerError> {
    T::deserialize(value).map_err(|_| {
        HandlerError::bad_request(format!("parameter {key} has an invalid type"))
    })
}
