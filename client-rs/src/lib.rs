//! DAB Rust Client
//!
//! A typed controller for DAB 0.1 devices. Each command is a plain async call;
//! correlation, response subscriptions and timeouts are handled by the
//! underlying [`dab_mqtt::DabSession`].
//!
//! # Example
//!
//! ```no_run
//! use dab_client::DabClient;
//! use dab_mqtt::SessionConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DabClient::connect(SessionConfig::new("controller"), "localhost", 1883).await?;
//!
//!     let health = client.health_check().await?;
//!     println!("Device healthy: {}", health.healthy);
//!
//!     for app in client.list_applications().await?.applications {
//!         println!("{} ({})", app.friendly_name, app.app_id);
//!     }
//!
//!     client.launch("YouTube", None).await?;
//!     client.key_press("KEY_ENTER").await?;
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod messages;

pub use client::DabClient;
pub use error::{ClientError, Result};
pub use messages::{
    AppIdRequest, AppStateResponse, AppTelemetryRequest, Application, ApplicationListResponse,
    DeviceTelemetryRequest, ExitRequest, ExitResponse, HealthCheckResponse, KeyPressRequest,
    LanguageListResponse, LanguageRequest, LanguageResponse, LaunchRequest,
    LaunchWithContentRequest, LongKeyPressRequest, StatusResponse,
};
