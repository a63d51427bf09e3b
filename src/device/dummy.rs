//! Dummy ports for the reference device
//!
//! Every command is logged and answered with a canned response. Useful for
//! exercising controllers without real hardware.

use super::{Applications, System, Telemetry};
use crate::error::HandlerResult;
use crate::session::messages::ok;

use serde_json::{json, Value};
use tracing::info;

pub struct DummyApplications;

impl Applications for DummyApplications {
    fn list(&self) -> HandlerResult {
        info!("request: applications/list");
        Ok(json!({
            "status": 200,
            "applications": [
                {"appId": "Netflix", "friendlyName": "Netflix", "version": "1.0"},
                {"appId": "AmazonInstantVideo", "friendlyName": "Prime Video", "version": "1.0"},
                {"appId": "YouTube", "friendlyName": "YouTube", "version": "1.0"}
            ]
        }))
    }

    fn launch(&self, app_id: &str, parameters: Option<&Value>) -> HandlerResult {
        info!(app_id, ?parameters, "request: applications/launch");
        Ok(ok())
    }

    fn launch_with_content(
        &self,
        app_id: &str,
        content_id: &str,
        parameters: Option<&Value>,
    ) -> HandlerResult {
        info!(app_id, content_id, ?parameters, "request: applications/launch-with-content");
        Ok(ok())
    }

    fn exit(&self, app_id: &str, force: bool) -> HandlerResult {
        info!(app_id, force, "request: applications/exit");
        Ok(json!({"status": 200, "state": "STOPPED"}))
    }

    fn get_state(&self, app_id: &str) -> HandlerResult {
        info!(app_id, "request: applications/get-state");
        Ok(json!({"status": 200, "state": "STOPPED"}))
    }
}

pub struct DummySystem;

impl System for DummySystem {
    fn restart(&self) -> HandlerResult {
        info!("request: system/restart");
        Ok(ok())
    }

    fn list_languages(&self) -> HandlerResult {
        info!("request: system/language/list");
        Ok(json!({"status": 200, "languages": ["en-GB", "en-US", "fr"]}))
    }

    fn get_language(&self) -> HandlerResult {
        info!("request: system/language/get");
        Ok(json!({"status": 200, "language": "en-US"}))
    }

    fn set_language(&self, language: &str) -> HandlerResult {
        info!(language, "request: system/language/set");
        Ok(ok())
    }

    fn key_press(&self, key_code: &str) -> HandlerResult {
        info!(key_code, "request: input/key-press");
        Ok(ok())
    }

    fn long_key_press(&self, key_code: &str, duration_ms: u64) -> HandlerResult {
        info!(key_code, duration_ms, "request: input/long-key-press");
        Ok(ok())
    }

    fn health_check(&self) -> HandlerResult {
        info!("request: health-check/get");
        Ok(json!({"status": 200, "healthy": true}))
    }
}

pub struct DummyTelemetry;

impl Telemetry for DummyTelemetry {
    fn start_device_telemetry(&self, frequency: u64) -> HandlerResult {
        info!(frequency, "request: device-telemetry/start");
        Ok(ok())
    }

    fn stop_device_telemetry(&self) -> HandlerResult {
        info!("request: device-telemetry/stop");
        Ok(ok())
    }

    fn start_app_telemetry(&self, app_id: &str, frequency: u64) -> HandlerResult {
        info!(app_id, frequency, "request: app-telemetry/start");
        Ok(ok())
    }

    fn stop_app_telemetry(&self, app_id: &str) -> HandlerResult {
        info!(app_id, "request: app-telemetry/stop");
        Ok(ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_application_list() {
        let body = DummyApplications.list().unwrap();
        let ids: Vec<&str> = body["applications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|app| app["appId"].as_str().unwrap())
            .collect();

        assert_eq!(ids, vec!["Netflix", "AmazonInstantVideo", "YouTube"]);
    }

    #[test]
    fn test_dummy_get_state() {
        let body = DummyApplications.get_state("YouTube").unwrap();
        assert_eq!(body, json!({"status": 200, "state": "STOPPED"}));
    }

    #[test]
    fn test_dummy_languages() {
        assert_eq!(DummySystem.get_language().unwrap()["language"], "en-US");
        assert_eq!(
            DummySystem.list_languages().unwrap()["languages"],
            json!(["en-GB", "en-US", "fr"])
        );
    }
}
