//! Application entry point for the `fogflow-fog` aggregation node.
//!
//! Startup sequence:
//! - Initialize structured logging/tracing
//! - Load configuration from environment variables or `.env`
//! - Build the cloud uplink client and the MQTT bus
//! - Perform the initial cloud authentication (non-fatal on failure)
//! - Run the node loop until Ctrl-C
//!
//! # Environment Variables
//! - `CLOUD_API_BASE` (**required**) – cloud API base URL
//! - `USER_FOG` / `PASSWORD_FOG` (**required**) – login credentials
//! - `MQTT_BROKER_HOST` / `MQTT_BROKER_PORT` (optional) – broker address

use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::sync::watch;

use fogflow::config;
use fogflow::fog::{CloudClient, FogNode, MqttBus};
use fogflow::init_tracing;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_fog_from_env()?;
    cfg.log_config();

    let cloud = CloudClient::from_config(&cfg)?;
    let (bus, mut eventloop) = MqttBus::connect(&cfg);
    let bus = Arc::new(bus);

    let mut node = FogNode::new(&cfg, cloud, bus.clone());
    node.connect().await;

    // Ctrl-C flips the shutdown watch; the run loop disconnects and exits.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    tracing::info!("Fog node started");
    node.run(&bus, &mut eventloop, stop_rx).await?;
    tracing::info!("Fog node stopped");

    Ok(())
}
