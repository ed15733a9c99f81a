//! Payloads exchanged with peers over the federation session protocol.
//!
//! The session-open handshake carries the sender's overhead model so both
//! ends predict the same forwarding tax; periodic session updates carry
//! the sender's prediction-accuracy telemetry.

use rlh_types::OverheadModel;
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySnapshot;

/// Session-open payload: `{"overhead_model": {...}}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilityAdvertisement {
    pub overhead_model: OverheadModel,
}

impl CapabilityAdvertisement {
    pub fn new(overhead_model: OverheadModel) -> Self {
        Self { overhead_model }
    }
}

/// Session-update payload. Aggregates not yet computed are sent as `null`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    pub overhead_mape_7d: Option<f64>,
    pub overhead_p95_factor: Option<f64>,
}

impl From<TelemetrySnapshot> for TelemetryUpdate {
    fn from(snapshot: TelemetrySnapshot) -> Self {
        Self {
            overhead_mape_7d: snapshot.mape,
            overhead_p95_factor: snapshot.p95_factor,
        }
    }
}
