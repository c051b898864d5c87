//! The aggregation node: buffers sensor events, analyzes them locally and
//! periodically forwards one aggregated record to the cloud.
//!
//! Lifecycle: `Disconnected → Authenticating → Ready`, then the steady
//! cycle `Buffering ⇄ Forwarding`. The buffer is cleared only after the
//! cloud confirms delivery; every failure path retains it for the next
//! cycle, so data is lost only if the ring overflows before a send lands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rumqttc::{Event, EventLoop, Packet};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::FogConfig;
use crate::fog::bus::{MessageBus, MqttBus};
use crate::fog::cloud::{CloudClient, ForwardOutcome};
use crate::models::{AggregatedRecord, RawSensorEvent, SensorReading};
use crate::ring::Ring;

/// Single-reading temperature above which a regional-heat warning fires.
const HEAT_WARNING_THRESHOLD: f64 = 37.0;

/// Mean vibration above which a regional-vibration warning fires.
const VIBRATION_WARNING_MEAN: f64 = 7.0;

/// Vibration analysis looks at the last 5 buffered readings and needs at
/// least 3 of them to carry a vibration value.
const VIBRATION_LOOKBACK: usize = 5;
const VIBRATION_MIN_SAMPLES: usize = 3;

// ---

#[derive(Debug, Error)]
pub enum FogError {
    // ---
    /// Inbound sensor payload failed to decode; logged and dropped.
    #[error("malformed sensor payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Connection lifecycle of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Disconnected,
    Authenticating,
    Ready,
    Buffering,
    Forwarding,
}

/// Observational finding from per-message local analysis. Emitting one
/// never mutates the buffer or triggers a forward.
#[derive(Debug, Clone, PartialEq)]
enum RegionalWarning {
    Heat { temperature: f64 },
    Vibration { mean: f64 },
}

pub struct FogNode {
    // ---
    buffer: Ring<SensorReading>,
    cloud: CloudClient,
    bus: Arc<dyn MessageBus>,
    sensors_topic: String,
    actuator_topic: String,
    region: String,
    aggregation_interval: Duration,
    phase: NodePhase,
}

impl FogNode {
    pub fn new(config: &FogConfig, cloud: CloudClient, bus: Arc<dyn MessageBus>) -> Self {
        // ---
        Self {
            buffer: Ring::new(config.buffer_capacity as usize),
            cloud,
            bus,
            sensors_topic: config.sensors_topic.clone(),
            actuator_topic: config.actuator_topic.clone(),
            region: config.region.clone(),
            aggregation_interval: Duration::from_secs(config.aggregation_interval_secs as u64),
            phase: NodePhase::Disconnected,
        }
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    fn set_phase(&mut self, phase: NodePhase) {
        // ---
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "node phase transition");
            self.phase = phase;
        }
    }

    /// Initial cloud authentication. Failure is not fatal; the first
    /// aggregation cycle retries.
    pub async fn connect(&mut self) {
        // ---
        self.set_phase(NodePhase::Authenticating);
        match self.cloud.login().await {
            Ok(()) => self.set_phase(NodePhase::Ready),
            Err(e) => {
                error!("initial cloud authentication failed: {e}");
                self.set_phase(NodePhase::Disconnected);
            }
        }
    }

    /// Parse, tag and buffer one inbound sensor message, then run local
    /// analysis on the updated buffer.
    pub fn handle_sensor_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), FogError> {
        // ---
        let event: RawSensorEvent = serde_json::from_slice(payload)?;
        let reading = SensorReading {
            event,
            received_at: Utc::now(),
            source_topic: topic.to_string(),
        };

        debug!(topic, "buffered sensor reading");
        self.buffer.push(reading);
        if matches!(self.phase, NodePhase::Ready) {
            self.set_phase(NodePhase::Buffering);
        }

        for warning in self.local_analysis() {
            match warning {
                RegionalWarning::Heat { temperature } => {
                    warn!(temperature, "regional alert: elevated temperature");
                    self.send_actuator_command(json!({ "cooler": 1 }));
                }
                RegionalWarning::Vibration { mean } => {
                    warn!(
                        mean_vibration = mean,
                        "regional alert: excessive vibration across devices"
                    );
                }
            }
        }

        Ok(())
    }

    /// Regional pattern detection over the newest reading and the recent
    /// vibration tail.
    fn local_analysis(&self) -> Vec<RegionalWarning> {
        // ---
        let mut warnings = Vec::new();

        if let Some(temperature) = self.buffer.last().and_then(|r| r.event.temperature) {
            if temperature > HEAT_WARNING_THRESHOLD {
                warnings.push(RegionalWarning::Heat { temperature });
            }
        }

        let vibrations: Vec<f64> = self
            .buffer
            .tail(VIBRATION_LOOKBACK)
            .filter_map(|r| r.event.vibration)
            .collect();

        if vibrations.len() >= VIBRATION_MIN_SAMPLES {
            let mean = vibrations.iter().sum::<f64>() / vibrations.len() as f64;
            if mean > VIBRATION_WARNING_MEAN {
                warnings.push(RegionalWarning::Vibration { mean });
            }
        }

        warnings
    }

    /// Summarize the current buffer into one immutable record; `None` when
    /// the buffer is empty. Statistics with no inputs default to zero.
    pub fn aggregate(&self) -> Option<AggregatedRecord> {
        // ---
        if self.buffer.is_empty() {
            return None;
        }

        let temperatures: Vec<f64> = self
            .buffer
            .iter()
            .filter_map(|r| r.event.temperature)
            .collect();
        let vibrations: Vec<f64> = self
            .buffer
            .iter()
            .filter_map(|r| r.event.vibration)
            .collect();
        let presence_count: u32 = self
            .buffer
            .iter()
            .filter_map(|r| r.event.presence)
            .map(u32::from)
            .sum();

        Some(AggregatedRecord {
            avg_temperature: mean(&temperatures),
            max_temperature: temperatures.iter().copied().reduce(f64::max).unwrap_or(0.0),
            min_temperature: temperatures.iter().copied().reduce(f64::min).unwrap_or(0.0),
            avg_vibration: mean(&vibrations),
            presence_count,
            samples_count: self.buffer.len(),
            timestamp: Some(Utc::now()),
            region: self.region.clone(),
        })
    }

    /// One aggregation cycle: skip when the buffer is empty, make sure a
    /// usable token is held, forward, and clear the buffer only on success.
    pub async fn run_aggregation_cycle(&mut self) {
        // ---
        if self.buffer.is_empty() {
            debug!("buffer empty, skipping aggregation cycle");
            return;
        }

        if !self.cloud.has_valid_token() {
            self.set_phase(NodePhase::Authenticating);
            if let Err(e) = self.cloud.ensure_token().await {
                error!("cannot forward without a token, retrying next cycle: {e}");
                self.set_phase(NodePhase::Buffering);
                return;
            }
        }

        let Some(record) = self.aggregate() else {
            return;
        };
        info!(
            samples = record.samples_count,
            avg_temperature = record.avg_temperature,
            "forwarding aggregated record"
        );

        self.set_phase(NodePhase::Forwarding);
        match self.cloud.forward(&record).await {
            ForwardOutcome::Delivered => {
                info!("aggregate delivered, clearing buffer");
                self.buffer.clear();
            }
            ForwardOutcome::AuthRejected => {
                warn!("token rejected, buffer retained for next cycle");
            }
            ForwardOutcome::Failed => {
                warn!("forward failed, buffer retained for next cycle");
            }
        }
        self.set_phase(NodePhase::Buffering);
    }

    /// Publish a command on the actuator topic. Fire and forget; failures
    /// are logged and never fatal.
    pub fn send_actuator_command(&self, command: Value) {
        // ---
        let payload = command.to_string().into_bytes();
        match self.bus.publish(&self.actuator_topic, payload) {
            Ok(()) => info!(%command, "actuator command published"),
            Err(e) => error!("failed to publish actuator command: {e}"),
        }
    }

    /// Drive the node until shutdown: MQTT events, the aggregation clock
    /// and the stop signal share one cooperative timeline, so each message
    /// is handled to completion without blocking the next arrival.
    pub async fn run(
        &mut self,
        mqtt: &MqttBus,
        eventloop: &mut EventLoop,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        // ---
        let mut cycle = tokio::time::interval(self.aggregation_interval);
        cycle.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                        match mqtt.subscribe(&self.sensors_topic).await {
                            Ok(()) => info!("subscribed to topic: {}", self.sensors_topic),
                            Err(e) => error!("subscribe failed: {e}"),
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Err(e) = self.handle_sensor_message(&publish.topic, &publish.payload) {
                            error!(topic = %publish.topic, "dropping sensor message: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT connection error: {e}");
                        // rumqttc reconnects on the next poll; back off first.
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
                _ = cycle.tick() => self.run_aggregation_cycle().await,
                _ = shutdown.changed() => {
                    info!("stop signal received, shutting down fog node");
                    mqtt.disconnect().await;
                    break;
                }
            }
        }

        Ok(())
    }
}

fn mean(values: &[f64]) -> f64 {
    // ---
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::Mutex;

    /// Bus double that records every publish.
    #[derive(Default)]
    struct RecordingBus {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingBus {
        fn published(&self) -> Vec<(String, Vec<u8>)> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl MessageBus for RecordingBus {
        fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    fn test_config(buffer_capacity: u32) -> FogConfig {
        // ---
        FogConfig {
            mqtt_host: "localhost".into(),
            mqtt_port: 1883,
            sensors_topic: "sensors/data".into(),
            actuator_topic: "actuator/control".into(),
            cloud_api_base: "http://localhost:1".into(),
            username: "fog_node".into(),
            password: "pw".into(),
            aggregation_interval_secs: 30,
            buffer_capacity,
            token_refresh_margin_secs: 300,
            forward_timeout_secs: 10,
            region: "south_zone".into(),
        }
    }

    fn test_node(buffer_capacity: u32) -> (FogNode, Arc<RecordingBus>) {
        // ---
        let config = test_config(buffer_capacity);
        let cloud = CloudClient::from_config(&config).unwrap();
        let bus = Arc::new(RecordingBus::default());
        (FogNode::new(&config, cloud, bus.clone()), bus)
    }

    fn sensor_payload(temperature: f64, vibration: f64, presence: u8) -> Vec<u8> {
        json!({
            "temperature": temperature,
            "vibration": vibration,
            "presence": presence,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_malformed_payload_is_rejected_not_buffered() {
        // ---
        let (mut node, _bus) = test_node(100);

        let err = node.handle_sensor_message("sensors/data", b"not json");
        assert!(matches!(err, Err(FogError::MalformedPayload(_))));
        assert_eq!(node.buffer_len(), 0);
    }

    #[test]
    fn test_reading_is_tagged_and_buffered() {
        // ---
        let (mut node, _bus) = test_node(100);

        node.handle_sensor_message("sensors/data", &sensor_payload(25.0, 2.0, 1))
            .unwrap();
        assert_eq!(node.buffer_len(), 1);

        let reading = node.buffer.last().unwrap();
        assert_eq!(reading.source_topic, "sensors/data");
        assert_eq!(reading.event.temperature, Some(25.0));
    }

    #[test]
    fn test_buffer_bounded_oldest_evicted() {
        // ---
        let (mut node, _bus) = test_node(3);

        for i in 0..10 {
            node.handle_sensor_message("sensors/data", &sensor_payload(20.0 + i as f64, 0.0, 0))
                .unwrap();
        }

        assert_eq!(node.buffer_len(), 3);
        let temps: Vec<f64> = node
            .buffer
            .iter()
            .filter_map(|r| r.event.temperature)
            .collect();
        assert_eq!(temps, vec![27.0, 28.0, 29.0]);
    }

    #[test]
    fn test_heat_warning_fires_above_threshold() {
        // ---
        let (mut node, bus) = test_node(100);

        node.handle_sensor_message("sensors/data", &sensor_payload(37.5, 0.0, 0))
            .unwrap();
        let warnings = node.local_analysis();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, RegionalWarning::Heat { temperature } if *temperature == 37.5)));

        // The heat path also commands the cooler on.
        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "actuator/control");
        let command: Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(command["cooler"], 1);
    }

    #[test]
    fn test_no_heat_warning_at_normal_temperature() {
        // ---
        let (mut node, bus) = test_node(100);

        node.handle_sensor_message("sensors/data", &sensor_payload(30.0, 0.0, 0))
            .unwrap();
        assert!(node.local_analysis().is_empty());
        assert!(bus.published().is_empty());
    }

    #[test]
    fn test_vibration_warning_needs_three_samples() {
        // ---
        let (mut node, _bus) = test_node(100);

        // Two high-vibration readings: below the sample floor, no warning.
        for _ in 0..2 {
            node.handle_sensor_message("sensors/data", &sensor_payload(20.0, 9.0, 0))
                .unwrap();
        }
        assert!(node.local_analysis().is_empty());

        // Third sample pushes the mean (9.0) past the threshold.
        node.handle_sensor_message("sensors/data", &sensor_payload(20.0, 9.0, 0))
            .unwrap();
        let warnings = node.local_analysis();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, RegionalWarning::Vibration { mean } if (*mean - 9.0).abs() < 1e-9)));
    }

    #[test]
    fn test_vibration_mean_uses_recent_tail_only() {
        // ---
        let (mut node, _bus) = test_node(100);

        // Old calm readings fall outside the 5-reading lookback once the
        // noisy ones arrive.
        for _ in 0..5 {
            node.handle_sensor_message("sensors/data", &sensor_payload(20.0, 1.0, 0))
                .unwrap();
        }
        assert!(node.local_analysis().is_empty());

        for _ in 0..5 {
            node.handle_sensor_message("sensors/data", &sensor_payload(20.0, 8.0, 0))
                .unwrap();
        }
        let warnings = node.local_analysis();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_aggregate_over_partial_fields() {
        // ---
        let (mut node, _bus) = test_node(100);

        node.handle_sensor_message("sensors/data", &sensor_payload(20.0, 5.0, 1))
            .unwrap();
        node.handle_sensor_message("sensors/data", &sensor_payload(30.0, 7.0, 1))
            .unwrap();
        // A reading with no temperature or vibration still counts as a sample.
        node.handle_sensor_message("sensors/data", br#"{"presence": 0}"#)
            .unwrap();

        let record = node.aggregate().unwrap();
        assert_eq!(record.avg_temperature, 25.0);
        assert_eq!(record.max_temperature, 30.0);
        assert_eq!(record.min_temperature, 20.0);
        assert_eq!(record.avg_vibration, 6.0);
        assert_eq!(record.presence_count, 2);
        assert_eq!(record.samples_count, 3);
        assert_eq!(record.region, "south_zone");
    }

    #[test]
    fn test_aggregate_empty_buffer_is_none() {
        // ---
        let (node, _bus) = test_node(100);
        assert!(node.aggregate().is_none());
    }

    #[tokio::test]
    async fn test_cycle_without_cloud_retains_buffer() {
        // ---
        // No cloud is reachable at the configured address: authentication
        // fails and the buffer must survive the cycle untouched.
        let (mut node, _bus) = test_node(100);
        node.handle_sensor_message("sensors/data", &sensor_payload(25.0, 1.0, 0))
            .unwrap();

        node.run_aggregation_cycle().await;
        assert_eq!(node.buffer_len(), 1);
    }
}
