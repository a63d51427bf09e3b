//! DAB reference device daemon - answers DAB commands with dummy ports

use anyhow::{Context, Result};
use clap::Parser;
use dab_mqtt::device::{new_device, DeviceInfo, DevicePorts};
use dab_mqtt::{MqttConnector, SessionConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dabd")]
#[command(about = "DAB reference device over MQTT")]
#[command(version)]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost", env = "DAB_BROKER_HOST")]
    host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883, env = "DAB_BROKER_PORT")]
    port: u16,

    /// MQTT client identifier
    #[arg(long, default_value = "DAB reference implementation", env = "DAB_CLIENT_ID")]
    client_id: String,

    /// Manufacturer announced on dab/device/info
    #[arg(long, default_value = "DAB reference")]
    manufacturer: String,

    /// Model announced on dab/device/info
    #[arg(long, default_value = "DAB Reference Implementation")]
    model: String,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    run_device(args).await
}

async fn run_device(args: Args) -> Result<()> {
    let device_info = DeviceInfo::new(args.manufacturer, args.model);

    let device = new_device(
        SessionConfig::new(args.client_id),
        DevicePorts::dummy(),
        &device_info,
    )?
    .build(MqttConnector::default())
    .context("Invalid device configuration")?;

    device
        .connect(&args.host, args.port)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", args.host, args.port))?;

    info!(host = %args.host, port = args.port, "DAB device ready");

    tokio::select! {
        result = device.wait() => {
            result?;
            warn!("Connection to the broker closed");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, disconnecting");
            if let Err(e) = device.disconnect().await {
                warn!(error = %e, "Failed to disconnect cleanly");
            }
        }
    }

    info!("DAB device stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
