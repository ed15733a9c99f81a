//! Overhead prediction telemetry.
//!
//! A bounded window of (predicted, actual) overhead pairs with two
//! aggregates recomputed over the whole window on every insert:
//!
//! - MAPE, once at least `mape_min_samples` measurements exist.
//! - 95th-percentile `actual / predicted` factor, once at least
//!   `p95_min_samples` exist.
//!
//! Both axes (tokens and USD micros) are pooled into one sample set.
//! Samples whose prediction is zero are skipped. The exported gauge names
//! say "7d" but the window is count-bounded, not time-bounded.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TelemetryConfig;

/// Default ring-buffer capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Measurements required before MAPE is reported.
pub const MAPE_MIN_SAMPLES: usize = 10;

/// Measurements required before the p95 factor is reported.
pub const P95_MIN_SAMPLES: usize = 20;

/// One forwarded hop's predicted and observed overhead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverheadMeasurement {
    pub timestamp: DateTime<Utc>,
    pub predicted_tokens: u64,
    pub actual_tokens: u64,
    pub predicted_usd_micros: u64,
    pub actual_usd_micros: u64,
}

impl OverheadMeasurement {
    pub fn new(
        predicted_tokens: u64,
        actual_tokens: u64,
        predicted_usd_micros: u64,
        actual_usd_micros: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            predicted_tokens,
            actual_tokens,
            predicted_usd_micros,
            actual_usd_micros,
        }
    }

    /// (predicted, actual) pairs for both axes.
    fn axes(&self) -> [(u64, u64); 2] {
        [
            (self.predicted_tokens, self.actual_tokens),
            (self.predicted_usd_micros, self.actual_usd_micros),
        ]
    }
}

/// Aggregates produced by a single insert. `None` means the threshold was
/// not met (or no usable samples) and the previous value stands.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Recomputed {
    pub mape: Option<f64>,
    pub p95_factor: Option<f64>,
}

/// Point-in-time view of the telemetry window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub samples: usize,
    pub mape: Option<f64>,
    pub p95_factor: Option<f64>,
}

/// Fixed-capacity ring buffer of measurements; oldest evicted first.
#[derive(Debug, Clone)]
pub struct OverheadTelemetry {
    window: VecDeque<OverheadMeasurement>,
    capacity: usize,
    mape_min_samples: usize,
    p95_min_samples: usize,
    mape: Option<f64>,
    p95_factor: Option<f64>,
}

impl OverheadTelemetry {
    /// # Panics
    ///
    /// Panics if `config.capacity` is zero. [`TelemetryConfig::validate`]
    /// rejects that before a processor is built.
    pub fn new(config: &TelemetryConfig) -> Self {
        assert!(config.capacity > 0, "telemetry capacity must be non-zero");
        Self {
            window: VecDeque::with_capacity(config.capacity.min(1024)),
            capacity: config.capacity,
            mape_min_samples: config.mape_min_samples,
            p95_min_samples: config.p95_min_samples,
            mape: None,
            p95_factor: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverheadMeasurement> {
        self.window.iter()
    }

    pub fn latest(&self) -> Option<&OverheadMeasurement> {
        self.window.back()
    }

    /// Append a measurement, evicting the oldest at capacity, then
    /// recompute both aggregates over the full window.
    pub fn record(&mut self, measurement: OverheadMeasurement) -> Recomputed {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(measurement);
        self.recompute()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            samples: self.window.len(),
            mape: self.mape,
            p95_factor: self.p95_factor,
        }
    }

    fn recompute(&mut self) -> Recomputed {
        let mut out = Recomputed::default();
        let n = self.window.len();

        if n >= self.mape_min_samples {
            if let Some(mape) = self.compute_mape() {
                self.mape = Some(mape);
                out.mape = Some(mape);
            }
        }

        if n >= self.p95_min_samples {
            if let Some(p95) = self.compute_p95_factor() {
                self.p95_factor = Some(p95);
                out.p95_factor = Some(p95);
            }
        }

        out
    }

    fn usable_pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.window
            .iter()
            .flat_map(|m| m.axes())
            .filter(|(predicted, _)| *predicted > 0)
            .map(|(predicted, actual)| (predicted as f64, actual as f64))
    }

    fn compute_mape(&self) -> Option<f64> {
        let (sum, count) = self
            .usable_pairs()
            .map(|(predicted, actual)| (actual - predicted).abs() / predicted)
            .fold((0.0, 0usize), |(sum, count), err| (sum + err, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    fn compute_p95_factor(&self) -> Option<f64> {
        let mut ratios: Vec<f64> = self
            .usable_pairs()
            .map(|(predicted, actual)| actual / predicted)
            .collect();
        if ratios.is_empty() {
            return None;
        }
        ratios.sort_by(|a, b| a.total_cmp(b));
        let idx = ((ratios.len() as f64 * 0.95) as usize).min(ratios.len() - 1);
        Some(ratios[idx])
    }
}

impl Default for OverheadTelemetry {
    fn default() -> Self {
        Self::new(&TelemetryConfig::default())
    }
}
