use serde::{Deserialize, Serialize};

use crate::error::{Result, RlhError};

/// Linear predictor of the per-hop forwarding tax.
///
/// `overhead_tokens = floor(alpha * payload_tokens + beta)` and
/// `overhead_usd_micros = floor(gamma * payload_usd_micros + delta)`.
/// Models are immutable; a router swaps the whole model when a peer
/// advertises a new version.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverheadModel {
    pub version: u32,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
}

impl Default for OverheadModel {
    fn default() -> Self {
        Self {
            version: 1,
            alpha: 0.01,
            beta: 10.0,
            gamma: 0.02,
            delta: 0.00001,
        }
    }
}

impl OverheadModel {
    pub fn new(version: u32, alpha: f64, beta: f64, gamma: f64, delta: f64) -> Result<Self> {
        let model = Self {
            version,
            alpha,
            beta,
            gamma,
            delta,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("delta", self.delta),
        ] {
            if !value.is_finite() {
                return Err(RlhError::InvalidModel(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Predicted `(overhead_tokens, overhead_usd_micros)` for one hop.
    ///
    /// A zero payload still pays the constant terms.
    pub fn calculate_overhead(&self, payload_tokens: u64, payload_usd_micros: u64) -> (u64, u64) {
        let tokens = floor_to_u64(self.alpha * payload_tokens as f64 + self.beta);
        let usd = floor_to_u64(self.gamma * payload_usd_micros as f64 + self.delta);
        (tokens, usd)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }
}

fn floor_to_u64(value: f64) -> u64 {
    // Negative predictions floor at zero; `as` saturates at u64::MAX.
    value.floor().max(0.0) as u64
}
