//! Request and response bodies of the DAB 0.1 commands
//!
//! Field names follow the protocol's camelCase convention. Responses ignore
//! fields they do not know, so devices may add vendor extensions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope every response carries
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: u16,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchWithContentRequest {
    pub app_id: String,
    pub content_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    pub app_id: String,
    pub force: bool,
}

/// Body of commands addressing a single application
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdRequest {
    pub app_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPressRequest {
    pub key_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongKeyPressRequest {
    pub key_code: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceTelemetryRequest {
    /// Reporting interval in milliseconds
    pub frequency: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTelemetryRequest {
    pub app_id: String,
    pub frequency: u64,
}

/// An installed application
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    pub friendly_name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApplicationListResponse {
    pub applications: Vec<Application>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppStateResponse {
    pub state: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExitResponse {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LanguageListResponse {
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LanguageResponse {
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthCheckResponse {
    pub healthy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_launch_request_serialization() {
        let request = LaunchRequest {
            app_id: "YouTube".to_string(),
            parameters: None,
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"appId": "YouTube"}));

        let request = LaunchRequest {
            app_id: "YouTube".to_string(),
            parameters: Some(json!(["--kiosk"])),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"appId": "YouTube", "parameters": ["--kiosk"]})
        );
    }

    #[test]
    fn test_long_key_press_serialization() {
        let request = LongKeyPressRequest {
            key_code: "KEY_ENTER".to_string(),
            duration_ms: 2000,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"keyCode": "KEY_ENTER", "durationMs": 2000})
        );
    }

    #[test]
    fn test_application_list_deserialization() {
        let response: ApplicationListResponse = serde_json::from_value(json!({
            "status": 200,
            "applications": [
                {"appId": "Netflix", "friendlyName": "Netflix", "version": "1.0"},
                {"appId": "Custom", "friendlyName": "Custom App"}
            ]
        }))
        .unwrap();

        assert_eq!(response.applications.len(), 2);
        assert_eq!(response.applications[0].version.as_deref(), Some("1.0"));
        assert_eq!(response.applications[1].version, None);
    }

    #[test]
    fn test_status_response_deserialization() {
        let ok: StatusResponse = serde_json::from_value(json!({"status": 200})).unwrap();
        assert_eq!(ok, StatusResponse { status: 200, error: None });

        let err: StatusResponse =
            serde_json::from_value(json!({"status": 400, "error": "bad"})).unwrap();
        assert_eq!(err.error.as_deref(), Some("bad"));
    }
}
