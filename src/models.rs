//! Data models shared by the fog node and the cloud service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Raw sensor payload as published on the message channel.
///
/// Every field is optional on the wire; aggregation and local analysis only
/// consider the values that are present.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSensorEvent {
    // ---
    pub temperature: Option<f64>,
    pub vibration: Option<f64>,
    pub presence: Option<u8>,
}

/// A sensor event tagged on receipt; lives only in the fog buffer.
#[derive(Debug, Clone)]
pub struct SensorReading {
    // ---
    pub event: RawSensorEvent,
    pub received_at: DateTime<Utc>,
    pub source_topic: String,
}

/// One aggregation cycle's summary of the fog buffer. Immutable once built;
/// this is the body of `POST /api/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedRecord {
    // ---
    pub avg_temperature: f64,
    #[serde(default)]
    pub max_temperature: f64,
    #[serde(default)]
    pub min_temperature: f64,
    #[serde(default)]
    pub avg_vibration: f64,
    #[serde(default)]
    pub presence_count: u32,
    #[serde(default)]
    pub samples_count: usize,
    /// Aggregation-time stamp set by the fog node; the cloud replaces it
    /// with its own receipt stamp on ingest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub region: String,
}

/// An accepted record: the aggregate plus the server stamp and the
/// authenticated caller identity.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedRecord {
    // ---
    #[serde(flatten)]
    pub record: AggregatedRecord,
    pub timestamp: DateTime<Utc>,
    pub node: String,
}

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighTemperature,
    WarningTemperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Warning,
}

/// A threshold crossing recorded at ingestion time.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    // ---
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub value: f64,
}

impl Alert {
    /// Evaluate the alert thresholds for a single average temperature.
    ///
    /// Pure function of `value`: above 38 is a high alert, above 35 a
    /// warning, anything else none. No hysteresis across calls.
    pub fn evaluate(value: f64, timestamp: DateTime<Utc>) -> Option<Alert> {
        // ---
        if value > 38.0 {
            Some(Alert {
                kind: AlertKind::HighTemperature,
                message: format!("Critical temperature detected: {value:.2}°C"),
                timestamp,
                severity: Severity::High,
                value,
            })
        } else if value > 35.0 {
            Some(Alert {
                kind: AlertKind::WarningTemperature,
                message: format!("Elevated temperature: {value:.2}°C"),
                timestamp,
                severity: Severity::Warning,
                value,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_high_temperature_alert() {
        // ---
        let alert = Alert::evaluate(38.5, now()).expect("38.5 must alert");
        assert_eq!(alert.kind, AlertKind::HighTemperature);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.value, 38.5);
        assert!(alert.message.contains("38.50"));
    }

    #[test]
    fn test_warning_temperature_alert() {
        // ---
        let alert = Alert::evaluate(36.0, now()).expect("36 must warn");
        assert_eq!(alert.kind, AlertKind::WarningTemperature);
        assert_eq!(alert.severity, Severity::Warning);
    }

    #[test]
    fn test_no_alert_below_thresholds() {
        // ---
        assert!(Alert::evaluate(30.0, now()).is_none());

        // Edge cases: the thresholds themselves do not fire the next tier.
        assert!(Alert::evaluate(35.0, now()).is_none());
        let at_38 = Alert::evaluate(38.0, now()).expect("38 is above 35");
        assert_eq!(at_38.kind, AlertKind::WarningTemperature);
    }

    #[test]
    fn test_alert_serializes_with_wire_names() {
        // ---
        let alert = Alert::evaluate(39.1, now()).unwrap();
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["type"], "high_temperature");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["value"], 39.1);
    }

    #[test]
    fn test_aggregated_record_requires_avg_temperature() {
        // ---
        // Only avg_temperature is mandatory on ingest; everything else
        // defaults.
        let ok: Result<AggregatedRecord, _> =
            serde_json::from_value(serde_json::json!({"avg_temperature": 22.5}));
        assert!(ok.is_ok());

        let missing: Result<AggregatedRecord, _> =
            serde_json::from_value(serde_json::json!({"max_temperature": 22.5}));
        assert!(missing.is_err());
    }
}
