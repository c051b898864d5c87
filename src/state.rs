//! In-memory service state for the cloud ingestion API.
//!
//! `CloudState` owns everything the handlers share: the credential
//! authenticator, the bounded ingestion history, the append-only alert log
//! and the trend predictor. Each structure sits behind its own mutex; the
//! predictor's append + conditional refit runs as one critical section so a
//! concurrent forecast never sees a torn model. Lifecycle is process start
//! to process stop; nothing is persisted.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::error::ApiError;
use crate::models::{AggregatedRecord, Alert, IngestedRecord, Severity};
use crate::predictor::{Forecast, TrendPredictor};
use crate::ring::Ring;

// ---

pub struct CloudState {
    // ---
    auth: Authenticator,
    history: Mutex<Ring<IngestedRecord>>,
    alerts: Mutex<Vec<Alert>>,
    predictor: Mutex<TrendPredictor>,
}

/// Response body for `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusSummary {
    // ---
    pub status: &'static str,
    pub data_points: usize,
    pub alerts: usize,
    pub high_alerts: usize,
    pub warning_alerts: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub current_temperature: Option<f64>,
}

impl CloudState {
    pub fn new(auth: Authenticator, history_capacity: usize, window_capacity: usize) -> Self {
        // ---
        Self {
            auth,
            history: Mutex::new(Ring::new(history_capacity)),
            alerts: Mutex::new(Vec::new()),
            predictor: Mutex::new(TrendPredictor::new(window_capacity)),
        }
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    /// Accept one aggregated payload from an authenticated caller.
    ///
    /// Validates that a numeric `avg_temperature` is present, stamps the
    /// server timestamp and caller identity, appends to the bounded history,
    /// feeds the predictor and evaluates the alert thresholds on this value
    /// only. Re-sending the same payload creates a duplicate record; there
    /// is no deduplication.
    pub fn ingest(&self, identity: &str, payload: Value) -> Result<(), ApiError> {
        // ---
        let avg_temperature = payload
            .get("avg_temperature")
            .and_then(Value::as_f64)
            .ok_or(ApiError::MissingField("avg_temperature"))?;

        let mut record: AggregatedRecord = serde_json::from_value(payload)
            .map_err(|_| ApiError::MissingField("avg_temperature"))?;

        // The server stamp replaces whatever the node put on the record.
        record.timestamp = None;
        let stamped = IngestedRecord {
            record,
            timestamp: Utc::now(),
            node: identity.to_string(),
        };

        self.history
            .lock()
            .map_err(|_| ApiError::Internal)?
            .push(stamped.clone());

        // Append + conditional refit is one atomic unit under this lock.
        self.predictor
            .lock()
            .map_err(|_| ApiError::Internal)?
            .observe(avg_temperature);

        if let Some(alert) = Alert::evaluate(avg_temperature, stamped.timestamp) {
            warn!(value = avg_temperature, "alert: {}", alert.message);
            self.alerts
                .lock()
                .map_err(|_| ApiError::Internal)?
                .push(alert);
        }

        info!(
            node = %stamped.node,
            avg_temperature, "ingested aggregated record"
        );
        Ok(())
    }

    /// The most recent `limit` records, insertion order preserved.
    pub fn history(&self, limit: usize) -> Result<Vec<IngestedRecord>, ApiError> {
        // ---
        let history = self.history.lock().map_err(|_| ApiError::Internal)?;
        Ok(history.tail(limit).cloned().collect())
    }

    /// The most recent `limit` alert-log entries.
    pub fn alerts(&self, limit: usize) -> Result<Vec<Alert>, ApiError> {
        // ---
        let alerts = self.alerts.lock().map_err(|_| ApiError::Internal)?;
        let skip = alerts.len().saturating_sub(limit);
        Ok(alerts[skip..].to_vec())
    }

    /// Short-horizon forecast from the fitted trend line.
    pub fn predict(&self) -> Result<Forecast, ApiError> {
        // ---
        let predictor = self.predictor.lock().map_err(|_| ApiError::Internal)?;
        Ok(predictor.predict()?)
    }

    pub fn status(&self) -> Result<StatusSummary, ApiError> {
        // ---
        let history = self.history.lock().map_err(|_| ApiError::Internal)?;
        let alerts = self.alerts.lock().map_err(|_| ApiError::Internal)?;

        let high_alerts = alerts
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count();
        let last = history.last();

        Ok(StatusSummary {
            status: "operational",
            data_points: history.len(),
            alerts: alerts.len(),
            high_alerts,
            warning_alerts: alerts.len() - high_alerts,
            last_update: last.map(|r| r.timestamp),
            current_temperature: last.map(|r| r.record.avg_temperature),
        })
    }
}
