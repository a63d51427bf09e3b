//! DAB controller CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{bail, Context, Result};
use clap::Parser;
use dab_mqtt::device::topics;
use dab_mqtt::{DabSession, MqttConnector, SessionConfig};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (topic, payload) = match &cli.command {
        Commands::Request { topic, payload } => {
            let payload: Value = serde_json::from_str(payload)
                .with_context(|| format!("Request body is not valid JSON: {}", payload))?;
            (topic.clone(), payload)
        }
        Commands::HealthCheck => (topics::HEALTH_CHECK.to_string(), json!({})),
        Commands::ListApps => (topics::APPLICATIONS_LIST.to_string(), json!({})),
        Commands::Launch { app_id } => {
            (topics::APPLICATIONS_LAUNCH.to_string(), json!({ "appId": app_id }))
        }
        Commands::KeyPress { key_code } => {
            (topics::INPUT_KEY_PRESS.to_string(), json!({ "keyCode": key_code }))
        }
    };

    let response = request(&cli, &topic, &payload).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    match response.get("status").and_then(Value::as_u64) {
        Some(200) | None => Ok(()),
        Some(status) => bail!("Device answered with status {}", status),
    }
}

async fn request(cli: &Cli, topic: &str, payload: &Value) -> Result<Value> {
    let client_id = cli
        .client_id
        .clone()
        .unwrap_or_else(|| format!("dab-cli-{}", Uuid::new_v4()));

    let session = DabSession::builder(SessionConfig::new(client_id))
        .build(MqttConnector::default())
        .context("Invalid session configuration")?;

    session
        .connect(&cli.host, cli.port)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", cli.host, cli.port))?;

    debug!(topic, "Sending request");
    let result = session
        .request_with_timeout(topic, payload, Duration::from_millis(cli.timeout_ms))
        .await;

    if let Err(e) = session.disconnect().await {
        debug!(error = %e, "Disconnect failed");
    }

    result.with_context(|| format!("Request to {} failed", topic))
}
