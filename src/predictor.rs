//! Online linear trend model over recent average temperatures.
//!
//! The predictor keeps a bounded window of the values admitted by ingestion
//! and refits a least-squares line of value against integer window position
//! on every admission once more than 5 points are buffered. Forecasts
//! evaluate that line at the next 3 positions beyond the window.
//!
//! The owner (`CloudState`) serializes `observe` and `predict` behind one
//! mutex so a forecast never reads a half-refit model.

use thiserror::Error;
use tracing::warn;

use crate::ring::Ring;

/// Temperature above which a forecast flags overheating risk.
const OVERHEAT_THRESHOLD: f64 = 38.0;

/// Minimum window occupancy before the model is (re)fitted.
const MIN_FIT_POINTS: usize = 6;

// ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredictError {
    // ---
    /// The window has never held enough points to fit a line.
    #[error("not enough samples to fit a trend")]
    InsufficientData,
}

/// Three-step forecast plus the overheating flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    // ---
    pub predictions: [f64; 3],
    pub overheating_risk: bool,
}

#[derive(Debug, Clone, Copy)]
struct LinearModel {
    // ---
    slope: f64,
    intercept: f64,
}

impl LinearModel {
    /// Least-squares fit of `values[i]` against position `i`.
    ///
    /// Returns `None` for degenerate input (fewer than two points or a
    /// non-finite result), in which case the caller keeps its prior model.
    fn fit(values: &[f64]) -> Option<Self> {
        // ---
        let n = values.len() as f64;
        if n < 2.0 {
            return None;
        }

        let sum_x: f64 = (0..values.len()).map(|x| x as f64).sum();
        let sum_y: f64 = values.iter().sum();
        let sum_xy: f64 = values.iter().enumerate().map(|(x, y)| x as f64 * y).sum();
        let sum_xx: f64 = (0..values.len()).map(|x| (x * x) as f64).sum();

        let denom = n * sum_xx - sum_x * sum_x;
        if denom == 0.0 {
            return None;
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denom;
        let intercept = (sum_y - slope * sum_x) / n;

        if !slope.is_finite() || !intercept.is_finite() {
            return None;
        }

        Some(Self { slope, intercept })
    }

    fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

// ---

/// Incrementally refit trend model over a bounded value window.
#[derive(Debug)]
pub struct TrendPredictor {
    // ---
    window: Ring<f64>,
    model: Option<LinearModel>,
}

impl TrendPredictor {
    pub fn new(window_capacity: usize) -> Self {
        // ---
        Self {
            window: Ring::new(window_capacity),
            model: None,
        }
    }

    /// Admit a value: append to the window (evicting the oldest beyond
    /// capacity) and refit once the window holds more than 5 points. A
    /// degenerate fit is logged and skipped; the prior model stays.
    pub fn observe(&mut self, value: f64) {
        // ---
        self.window.push(value);

        if self.window.len() >= MIN_FIT_POINTS {
            let values: Vec<f64> = self.window.iter().copied().collect();
            match LinearModel::fit(&values) {
                Some(model) => self.model = Some(model),
                None => warn!(
                    samples = self.window.len(),
                    "degenerate trend input, keeping previous model"
                ),
            }
        }
    }

    /// Forecast the next 3 window positions from the fitted line.
    pub fn predict(&self) -> Result<Forecast, PredictError> {
        // ---
        let model = self.model.as_ref().ok_or(PredictError::InsufficientData)?;

        let n = self.window.len();
        let mut predictions = [0.0; 3];
        for (i, slot) in predictions.iter_mut().enumerate() {
            *slot = model.value_at((n + i) as f64);
        }

        let overheating_risk = predictions.iter().any(|p| *p > OVERHEAT_THRESHOLD);
        Ok(Forecast {
            predictions,
            overheating_risk,
        })
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
