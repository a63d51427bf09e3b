//! DAB 0.1 device
//!
//! Wires platform ports to the DAB command topics. A platform implements
//! [`Applications`], [`System`] and [`Telemetry`]; [`new_device`] turns them
//! into a session answering every command and announcing the device.

pub mod dummy;
pub mod params;
pub mod topics;

use crate::error::{HandlerResult, Result};
use crate::session::{DabSession, RequestHandler, RetainedMessage, SessionBuilder, SessionConfig};

use params::{mandatory, optional};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application lifecycle commands
pub trait Applications: Send + Sync {
    fn list(&self) -> HandlerResult;

    fn launch(&self, app_id: &str, parameters: Option<&Value>) -> HandlerResult;

    fn launch_with_content(
        &self,
        app_id: &str,
        content_id: &str,
        parameters: Option<&Value>,
    ) -> HandlerResult;

    fn exit(&self, app_id: &str, force: bool) -> HandlerResult;

    fn get_state(&self, app_id: &str) -> HandlerResult;
}

/// System, language, input and health commands
pub trait System: Send + Sync {
    fn restart(&self) -> HandlerResult;

    fn list_languages(&self) -> HandlerResult;

    fn get_language(&self) -> HandlerResult;

    fn set_language(&self, language: &str) -> HandlerResult;

    fn key_press(&self, key_code: &str) -> HandlerResult;

    fn long_key_press(&self, key_code: &str, duration_ms: u64) -> HandlerResult;

    fn health_check(&self) -> HandlerResult;
}

/// Telemetry commands. Frequencies are in milliseconds.
pub trait Telemetry: Send + Sync {
    fn start_device_telemetry(&self, frequency: u64) -> HandlerResult;

    fn stop_device_telemetry(&self) -> HandlerResult;

    fn start_app_telemetry(&self, app_id: &str, frequency: u64) -> HandlerResult;

    fn stop_app_telemetry(&self, app_id: &str) -> HandlerResult;
}

/// The platform implementation behind a device
#[derive(Clone)]
pub struct DevicePorts {
    pub applications: Arc<dyn Applications>,
    pub system: Arc<dyn System>,
    pub telemetry: Arc<dyn Telemetry>,
}

impl DevicePorts {
    /// Ports that log every command and answer with canned responses
    pub fn dummy() -> Self {
        Self {
            applications: Arc::new(dummy::DummyApplications),
            system: Arc::new(dummy::DummySystem),
            telemetry: Arc::new(dummy::DummyTelemetry),
        }
    }
}

/// Body announced on `dab/device/info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
}

impl DeviceInfo {
    pub fn new(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
        }
    }
}

/// Protocol versions announced on `dab/version`
pub fn versions() -> Value {
    json!({ "versions": ["0.1"] })
}

/// Build a DAB 0.1 device session.
///
/// Every command in [`topics::COMMANDS`] is bound to its port method, and the
/// version list and `device_info` are announced as retained messages on every
/// connection. Further handlers may still be added to the returned builder.
pub fn new_device<T>(config: SessionConfig, ports: DevicePorts, device_info: &T) -> Result<SessionBuilder>
where
    T: Serialize + ?Sized,
{
    let builder = DabSession::builder(config)
        .handlers(handlers(&ports))
        .retain(RetainedMessage::new(topics::VERSION, &versions())?)
        .retain(RetainedMessage::new(topics::DEVICE_INFO, device_info)?);

    Ok(builder)
}

fn handlers(ports: &DevicePorts) -> Vec<RequestHandler> {
    let apps = &ports.applications;
    let system = &ports.system;
    let telemetry = &ports.telemetry;

    vec![
        route(topics::APPLICATIONS_LIST, apps, |apps, _| apps.list()),
        route(topics::APPLICATIONS_LAUNCH, apps, |apps, payload| {
            let app_id: String = mandatory(payload, "appId")?;
            let parameters: Option<Value> = optional(payload, "parameters")?;
            apps.launch(&app_id, parameters.as_ref())
        }),
        route(topics::APPLICATIONS_LAUNCH_WITH_CONTENT, apps, |apps, payload| {
            let app_id: String = mandatory(payload, "appId")?;
            let content_id: String = mandatory(payload, "contentId")?;
            let parameters: Option<Value> = optional(payload, "parameters")?;
            apps.launch_with_content(&app_id, &content_id, parameters.as_ref())
        }),
        route(topics::APPLICATIONS_EXIT, apps, |apps, payload| {
            let app_id: String = mandatory(payload, "appId")?;
            let force = optional(payload, "force")?.unwrap_or(false);
            apps.exit(&app_id, force)
        }),
        route(topics::APPLICATIONS_GET_STATE, apps, |apps, payload| {
            let app_id: String = mandatory(payload, "appId")?;
            apps.get_state(&app_id)
        }),
        route(topics::SYSTEM_RESTART, system, |system, _| system.restart()),
        route(topics::SYSTEM_LANGUAGE_LIST, system, |system, _| {
            system.list_languages()
        }),
        route(topics::SYSTEM_LANGUAGE_GET, system, |system, _| {
            system.get_language()
        }),
        route(topics::SYSTEM_LANGUAGE_SET, system, |system, payload| {
            let language: String = mandatory(payload, "language")?;
            system.set_language(&language)
        }),
        route(topics::INPUT_KEY_PRESS, system, |system, payload| {
            let key_code: String = mandatory(payload, "keyCode")?;
            system.key_press(&key_code)
        }),
        route(topics::INPUT_LONG_KEY_PRESS, system, |system, payload| {
            let key_code: String = mandatory(payload, "keyCode")?;
            let duration_ms: u64 = mandatory(payload, "durationMs")?;
            system.long_key_press(&key_code, duration_ms)
        }),
        route(topics::HEALTH_CHECK, system, |system, _| system.health_check()),
        route(topics::DEVICE_TELEMETRY_START, telemetry, |telemetry, payload| {
            let frequency: u64 = mandatory(payload, "frequency")?;
            telemetry.start_device_telemetry(frequency)
        }),
        route(topics::DEVICE_TELEMETRY_STOP, telemetry, |telemetry, _| {
            telemetry.stop_device_telemetry()
        }),
        route(topics::APP_TELEMETRY_START, telemetry, |telemetry, payload| {
            let app_id: String = mandatory(payload, "appId")?;
            let frequency: u64 = mandatory(payload, "frequency")?;
            telemetry.start_app_telemetry(&app_id, frequency)
        }),
        route(topics::APP_TELEMETRY_STOP, telemetry, |telemetry, payload| {
            let app_id: String = mandatory(payload, "appId")?;
            telemetry.stop_app_telemetry(&app_id)
        }),
    ]
}

/// Bind a command topic to a port method
fn route<P, F>(topic: &str, port: &Arc<P>, call: F) -> RequestHandler
where
    P: ?Sized + Send + Sync + 'static,
    F: Fn(&P, &Value) -> HandlerResult + Send + Sync + 'static,
{
    let port = port.clone();
    RequestHandler::new(topic, move |_, payload| call(port.as_ref(), &payload))
}
