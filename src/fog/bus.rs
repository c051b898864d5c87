//! Message channel seam for the aggregation node.
//!
//! The node publishes through the narrow [`MessageBus`] trait so the
//! transport can be swapped (or faked in tests); [`MqttBus`] is the real
//! implementation over rumqttc.

use std::time::Duration;

use anyhow::Result;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::config::FogConfig;

// ---

/// Publish-side interface over the pub/sub transport.
pub trait MessageBus: Send + Sync {
    /// Queue a payload for publication. Non-blocking, best effort; the
    /// caller treats failures as non-fatal.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// MQTT transport handle. The paired [`EventLoop`] must be polled by the
/// node's run loop to make any progress.
pub struct MqttBus {
    // ---
    client: AsyncClient,
}

impl MqttBus {
    /// Build the client from configuration. No network traffic happens
    /// until the returned event loop is polled.
    pub fn connect(config: &FogConfig) -> (Self, EventLoop) {
        // ---
        let mut options = MqttOptions::new(
            "fogflow-node",
            config.mqtt_host.clone(),
            config.mqtt_port as u16,
        );
        options.set_keep_alive(Duration::from_secs(30));

        let (client, eventloop) = AsyncClient::new(options, 64);
        (Self { client }, eventloop)
    }

    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        // ---
        self.client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }

    pub async fn disconnect(&self) {
        // ---
        let _ = self.client.disconnect().await;
    }
}

impl MessageBus for MqttBus {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // ---
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }
}
