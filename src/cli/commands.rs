//! CLI command definitions

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dab")]
#[command(about = "Send DAB commands to a device over MQTT", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// MQTT broker host
    #[arg(long, env = "DAB_BROKER_HOST", default_value = "localhost", global = true)]
    pub host: String,

    /// MQTT broker port
    #[arg(long, env = "DAB_BROKER_PORT", default_value_t = 1883, global = true)]
    pub port: u16,

    /// MQTT client identifier (random when omitted)
    #[arg(long, env = "DAB_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// How long to wait for the device to answer
    #[arg(long, default_value_t = 5000, value_parser = parse_timeout, global = true)]
    pub timeout_ms: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send an arbitrary request
    ///
    /// Examples:
    ///   dab request dab/applications/list
    ///   dab request dab/system/language/set '{"language":"fr"}'
    Request {
        /// Command topic, without correlation suffix
        topic: String,

        /// JSON request body
        #[arg(default_value = "{}")]
        payload: String,
    },

    /// Check whether the device is healthy
    HealthCheck,

    /// List installed applications
    ListApps,

    /// Launch an application
    Launch {
        /// Application id, e.g. YouTube
        app_id: String,
    },

    /// Press a key on the device remote
    KeyPress {
        /// Key code, e.g. KEY_ENTER
        key_code: String,
    },
}

fn parse_timeout(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("timeout must be greater than zero".to_string()),
        Ok(ms) => Ok(ms),
        Err(_) => Err(format!("Invalid timeout: {}. Must be a number of milliseconds", s)),
    }
}
