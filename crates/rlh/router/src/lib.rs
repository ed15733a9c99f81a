//! RLH forwarding engine.
//!
//! One [`RlhProcessor`] per router. Frames enter fresh through
//! [`RlhProcessor::encapsulate_frame`] or in flight through
//! [`RlhProcessor::process_incoming_frame`]; every hop then calls
//! [`RlhProcessor::forward_frame`], the only place TTL and budgets are
//! consumed and overhead telemetry is recorded.
//!
//! ## Drop semantics
//!
//! - HMAC mismatch at ingress: silent drop, indistinguishable from loss.
//! - TTL or budget exhausted while forwarding: silent drop, counted per
//!   cause (`dropped_ttl` vs `dropped_budget`).
//!
//! Retries and re-routing belong to the surrounding router layer.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod negotiation;
pub mod observability;
pub mod processor;
pub mod telemetry;

pub use config::{LoggingConfig, RouterConfig, TelemetryConfig};
pub use error::{Result, RouterError};
pub use metrics::{
    InMemoryMetricsSink, MetricsSink, NoopMetricsSink, PrometheusMetricsSink, RlhCounter,
    RlhGauge,
};
pub use negotiation::{CapabilityAdvertisement, TelemetryUpdate};
pub use observability::init_tracing;
pub use processor::{
    ActualCostSource, Allowance, EchoPrediction, ForwardOutcome, IngressDecision,
    ProcessorStats, RlhProcessor,
};
pub use telemetry::{OverheadMeasurement, OverheadTelemetry, TelemetrySnapshot};
