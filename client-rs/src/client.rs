//! DAB client implementation

use crate::error::{ClientError, Result};
use crate::messages::*;

use dab_mqtt::device::topics;
use dab_mqtt::{DabSession, MqttConnector, SessionConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Typed DAB 0.1 controller
///
/// Wraps a connected [`DabSession`]. Cheaply cloneable; clones share the session.
#[derive(Clone)]
pub struct DabClient {
    session: DabSession,
    timeout: Option<Duration>,
}

impl DabClient {
    /// Wrap an already connected session
    pub fn new(session: DabSession) -> Self {
        Self {
            session,
            timeout: None,
        }
    }

    /// Connect a fresh session to an MQTT broker
    pub async fn connect(config: SessionConfig, host: &str, port: u16) -> Result<Self> {
        let session = DabSession::builder(config).build(MqttConnector::default())?;
        session.connect(host, port).await?;
        Ok(Self::new(session))
    }

    /// Override the session's default request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn session(&self) -> &DabSession {
        &self.session
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.session.disconnect().await?;
        Ok(())
    }

    // ========================================================================
    // Applications
    // ========================================================================

    pub async fn list_applications(&self) -> Result<ApplicationListResponse> {
        self.call(topics::APPLICATIONS_LIST, &json!({})).await
    }

    pub async fn launch(&self, app_id: &str, parameters: Option<Value>) -> Result<()> {
        let request = LaunchRequest {
            app_id: app_id.to_string(),
            parameters,
        };
        self.command(topics::APPLICATIONS_LAUNCH, &request).await
    }

    pub async fn launch_with_content(
        &self,
        app_id: &str,
        content_id: &str,
        parameters: Option<Value>,
    ) -> Result<()> {
        let request = LaunchWithContentRequest {
            app_id: app_id.to_string(),
            content_id: content_id.to_string(),
            parameters,
        };
        self.command(topics::APPLICATIONS_LAUNCH_WITH_CONTENT, &request)
            .await
    }

    pub async fn exit(&self, app_id: &str, force: bool) -> Result<ExitResponse> {
        let request = ExitRequest {
            app_id: app_id.to_string(),
            force,
        };
        self.call(topics::APPLICATIONS_EXIT, &request).await
    }

    pub async fn get_state(&self, app_id: &str) -> Result<AppStateResponse> {
        let request = AppIdRequest {
            app_id: app_id.to_string(),
        };
        self.call(topics::APPLICATIONS_GET_STATE, &request).await
    }

    // ========================================================================
    // System
    // ========================================================================

    pub async fn restart(&self) -> Result<()> {
        self.command(topics::SYSTEM_RESTART, &json!({})).await
    }

    pub async fn list_languages(&self) -> Result<LanguageListResponse> {
        self.call(topics::SYSTEM_LANGUAGE_LIST, &json!({})).await
    }

    pub async fn get_language(&self) -> Result<LanguageResponse> {
        self.call(topics::SYSTEM_LANGUAGE_GET, &json!({})).await
    }

    pub async fn set_language(&self, language: &str) -> Result<()> {
        let request = LanguageRequest {
            language: language.to_string(),
        };
        self.command(topics::SYSTEM_LANGUAGE_SET, &request).await
    }

    pub async fn health_check(&self) -> Result<HealthCheckResponse> {
        self.call(topics::HEALTH_CHECK, &json!({})).await
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub async fn key_press(&self, key_code: &str) -> Result<()> {
        let request = KeyPressRequest {
            key_code: key_code.to_string(),
        };
        self.command(topics::INPUT_KEY_PRESS, &request).await
    }

    pub async fn long_key_press(&self, key_code: &str, duration: Duration) -> Result<()> {
        let request = LongKeyPressRequest {
            key_code: key_code.to_string(),
            duration_ms: millis(duration),
        };
        self.command(topics::INPUT_LONG_KEY_PRESS, &request).await
    }

    // ========================================================================
    // Telemetry
    // ========================================================================

    pub async fn start_device_telemetry(&self, frequency: Duration) -> Result<()> {
        let request = DeviceTelemetryRequest {
            frequency: millis(frequency),
        };
        self.command(topics::DEVICE_TELEMETRY_START, &request).await
    }

    pub async fn stop_device_telemetry(&self) -> Result<()> {
        self.command(topics::DEVICE_TELEMETRY_STOP, &json!({})).await
    }

    pub async fn start_app_telemetry(&self, app_id: &str, frequency: Duration) -> Result<()> {
        let request = AppTelemetryRequest {
            app_id: app_id.to_string(),
            frequency: millis(frequency),
        };
        self.command(topics::APP_TELEMETRY_START, &request).await
    }

    pub async fn stop_app_telemetry(&self, app_id: &str) -> Result<()> {
        let request = AppIdRequest {
            app_id: app_id.to_string(),
        };
        self.command(topics::APP_TELEMETRY_STOP, &request).await
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Send a command whose only meaningful answer is its status
    async fn command<Req: Serialize + ?Sized>(&self, topic: &str, request: &Req) -> Result<()> {
        let _: Value = self.call(topic, request).await?;
        Ok(())
    }

    async fn call<Req, Res>(&self, topic: &str, request: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response: Value = match self.timeout {
            Some(timeout) => {
                self.session
                    .request_with_timeout(topic, request, timeout)
                    .await?
            }
            None => self.session.request(topic, request).await?,
        };

        check_status(topic, &response)?;
        debug!(topic, "Command succeeded");

        Ok(serde_json::from_value(response)?)
    }
}

/// Turn a non-200 response into an error
fn check_status(topic: &str, response: &Value) -> Result<()> {
    let envelope = StatusResponse::deserialize(response)?;

    if envelope.status == 200 {
        return Ok(());
    }

    let message = envelope.error.unwrap_or_default();
    warn!(topic, status = envelope.status, error = %message, "Device returned an error");

    Err(ClientError::Status {
        status: envelope.status,
        message,
    })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_ok() {
        assert!(check_status("dab/x", &json!({"status": 200, "healthy": true})).is_ok());
    }

    #[test]
    fn test_check_status_error() {
        let err = check_status("dab/x", &json!({"status": 404, "error": "no such app"})).unwrap_err();

        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "no such app");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_check_status_missing() {
        assert!(matches!(
            check_status("dab/x", &json!({"healthy": true})),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn test_millis() {
        assert_eq!(millis(Duration::from_secs(2)), 2000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
