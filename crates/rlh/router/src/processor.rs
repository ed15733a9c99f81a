use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rlh_types::{LinkKey, OverheadModel, QosTier, RlhFlag, RlhFrame, RlhHeader};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{RouterConfig, TelemetryConfig};
use crate::error::{Result, RouterError};
use crate::metrics::{MetricsSink, NoopMetricsSink, RlhCounter, RlhGauge};
use crate::negotiation::{CapabilityAdvertisement, TelemetryUpdate};
use crate::telemetry::{OverheadMeasurement, OverheadTelemetry, TelemetrySnapshot};

/// Initial allowance stamped on a frame at ingress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub ttl: u64,
    pub budget_tokens: u64,
    pub budget_usd_micros: u64,
}

/// Ingress classification of an authenticated frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngressDecision {
    /// Addressed to this router; hand to the application layer.
    LocalDeliver(RlhFrame),
    /// Addressed elsewhere; the caller picks a next hop and calls
    /// [`RlhProcessor::forward_frame`].
    Forward(RlhFrame),
}

/// Result of one forwarding step.
///
/// Drops carry no frame: the spend already applied is not refunded and
/// the frame is gone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    Forwarded(RlhFrame),
    DroppedTtl,
    DroppedBudget,
}

impl ForwardOutcome {
    pub fn into_frame(self) -> Option<RlhFrame> {
        match self {
            ForwardOutcome::Forwarded(frame) => Some(frame),
            ForwardOutcome::DroppedTtl | ForwardOutcome::DroppedBudget => None,
        }
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(self, ForwardOutcome::Forwarded(_))
    }
}

/// Source of the overhead a hop actually cost, for prediction telemetry.
///
/// No real cost feedback exists yet, so the default echoes the prediction
/// and the recorded error is always zero.
pub trait ActualCostSource: Send + Sync {
    /// `(actual_tokens, actual_usd_micros)` for a hop predicted at `predicted`.
    fn actual_overhead(&self, header: &RlhHeader, predicted: (u64, u64)) -> (u64, u64);
}

/// Reports the prediction as the actual cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoPrediction;

impl ActualCostSource for EchoPrediction {
    fn actual_overhead(&self, _header: &RlhHeader, predicted: (u64, u64)) -> (u64, u64) {
        predicted
    }
}

/// Counter and model snapshot returned by [`RlhProcessor::get_stats`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub forwarded: u64,
    pub dropped_ttl: u64,
    pub dropped_budget: u64,
    pub ecn_marked: u64,
    pub overhead_model: OverheadModel,
}

#[derive(Debug, Default)]
struct Counters {
    forwarded: AtomicU64,
    dropped_ttl: AtomicU64,
    dropped_budget: AtomicU64,
    ecn_marked: AtomicU64,
}

impl Counters {
    fn slot(&self, counter: RlhCounter) -> &AtomicU64 {
        match counter {
            RlhCounter::Forwarded => &self.forwarded,
            RlhCounter::DroppedTtl => &self.dropped_ttl,
            RlhCounter::DroppedBudget => &self.dropped_budget,
            RlhCounter::EcnMarked => &self.ecn_marked,
        }
    }
}

/// Per-router RLH forwarding engine.
///
/// Frames are owned by the caller and moved through the processor, so
/// distinct frames can be forwarded from many threads at once. The
/// processor's own shared state is the active overhead model (swapped
/// wholesale) and the telemetry window (appends serialised by a mutex).
///
/// State machine per frame:
///
/// ```text
/// Ingress ──► LocalDeliver
///         └─► Forward ──► Forwarded | DroppedTtl | DroppedBudget
/// ```
pub struct RlhProcessor {
    router_id: Uuid,
    key: Option<LinkKey>,
    model: RwLock<OverheadModel>,
    telemetry: Mutex<OverheadTelemetry>,
    counters: Counters,
    metrics: Arc<dyn MetricsSink>,
    cost_source: Arc<dyn ActualCostSource>,
}

impl RlhProcessor {
    /// Create a processor for `router_id`.
    ///
    /// Without a key the processor emits and accepts only all-zero tags,
    /// which must be opted into with `insecure_allow_unsigned`.
    pub fn new(
        router_id: Uuid,
        key: Option<LinkKey>,
        insecure_allow_unsigned: bool,
    ) -> Result<Self> {
        if key.is_none() && !insecure_allow_unsigned {
            return Err(RouterError::MissingSigningKey);
        }
        if key.is_none() {
            warn!(router_id = %router_id, "RLH processor running without a signing key");
        }

        let processor = Self {
            router_id,
            key,
            model: RwLock::new(OverheadModel::default()),
            telemetry: Mutex::new(OverheadTelemetry::default()),
            counters: Counters::default(),
            metrics: Arc::new(NoopMetricsSink),
            cost_source: Arc::new(EchoPrediction),
        };
        Ok(processor)
    }

    /// Build a processor from validated configuration.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        config.validate()?;
        let processor = Self::new(
            config.router_id,
            config.signing_key()?,
            config.insecure_allow_unsigned,
        )?
        .with_overhead_model(config.overhead_model)?
        .with_telemetry_config(&config.telemetry);
        Ok(processor)
    }

    /// Route counters and gauges to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        metrics.set_gauge(
            RlhGauge::OverheadModelVersion,
            f64::from(self.model.read().version),
        );
        self.metrics = metrics;
        self
    }

    /// Start with `model` instead of the default. Non-finite coefficients
    /// are rejected.
    pub fn with_overhead_model(self, model: OverheadModel) -> Result<Self> {
        model.validate()?;
        *self.model.write() = model;
        self.metrics
            .set_gauge(RlhGauge::OverheadModelVersion, f64::from(model.version));
        Ok(self)
    }

    /// Replace the telemetry window (discarding any recorded history).
    pub fn with_telemetry_config(mut self, config: &TelemetryConfig) -> Self {
        self.telemetry = Mutex::new(OverheadTelemetry::new(config));
        self
    }

    pub fn with_cost_source(mut self, cost_source: Arc<dyn ActualCostSource>) -> Self {
        self.cost_source = cost_source;
        self
    }

    pub fn router_id(&self) -> Uuid {
        self.router_id
    }

    pub fn is_insecure(&self) -> bool {
        self.key.is_none()
    }

    /// Wrap a payload entering the network here in a freshly signed header.
    pub fn encapsulate_frame(
        &self,
        dst_router_id: Uuid,
        egress_agent_id: u64,
        qos: QosTier,
        allowance: Allowance,
        payload: impl Into<Vec<u8>>,
    ) -> RlhFrame {
        let header = RlhHeader::create(
            dst_router_id,
            egress_agent_id,
            qos,
            allowance.ttl,
            allowance.budget_tokens,
            allowance.budget_usd_micros,
            self.key.as_ref(),
        );
        debug!(
            dst_router_id = %dst_router_id,
            qos = %qos,
            ttl = allowance.ttl,
            budget_tokens = allowance.budget_tokens,
            budget_usd_micros = allowance.budget_usd_micros,
            "Encapsulated frame"
        );
        RlhFrame::new(header, payload)
    }

    /// Authenticate and classify an in-flight frame. No accounting happens
    /// here.
    ///
    /// Returns `None` when the HMAC does not verify; the frame is dropped
    /// without an error so a sender cannot tell rejection from loss.
    pub fn process_incoming_frame(&self, frame: RlhFrame) -> Option<IngressDecision> {
        if !self.authenticate(frame.header()) {
            warn!(
                router_id = %self.router_id,
                dst_router_id = %frame.header().dst_router_id(),
                "RLH authentication failed, dropping frame"
            );
            return None;
        }

        if frame.header().dst_router_id() == self.router_id {
            debug!(router_id = %self.router_id, "Frame addressed here, delivering locally");
            return Some(IngressDecision::LocalDeliver(frame));
        }

        self.count(RlhCounter::Forwarded);
        debug!(
            router_id = %self.router_id,
            dst_router_id = %frame.header().dst_router_id(),
            "Frame classified for forwarding"
        );
        Some(IngressDecision::Forward(frame))
    }

    /// Apply one hop to `frame` and retarget it at `next_hop_id`.
    ///
    /// 1. Consume one TTL unit; an exhausted TTL drops the frame.
    /// 2. Predict this hop's overhead with the active model.
    /// 3. Spend it from both budgets; an exhausted budget drops the frame
    ///    (the spend is not refunded).
    /// 4. Retarget, mark ECN if congested, re-sign.
    /// 5. Count and record a telemetry measurement.
    pub fn forward_frame(
        &self,
        mut frame: RlhFrame,
        next_hop_id: Uuid,
        payload_tokens: u64,
        payload_usd_micros: u64,
        congestion_detected: bool,
    ) -> ForwardOutcome {
        let header = frame.header_mut();

        if !header.decrement_ttl() {
            self.count(RlhCounter::DroppedTtl);
            info!(
                router_id = %self.router_id,
                dst_router_id = %header.dst_router_id(),
                "TTL exhausted, dropping frame"
            );
            return ForwardOutcome::DroppedTtl;
        }

        let model = *self.model.read();
        let predicted = model.calculate_overhead(payload_tokens, payload_usd_micros);

        if !header.decrement_budget(predicted.0, predicted.1) {
            self.count(RlhCounter::DroppedBudget);
            info!(
                router_id = %self.router_id,
                dst_router_id = %header.dst_router_id(),
                budget_tokens = header.budget_tokens(),
                budget_usd_micros = header.budget_usd_micros(),
                overhead_tokens = predicted.0,
                overhead_usd_micros = predicted.1,
                "Budget exhausted, dropping frame"
            );
            return ForwardOutcome::DroppedBudget;
        }

        header.set_dst_router_id(next_hop_id);

        if congestion_detected {
            header.set_flag(RlhFlag::Ecn);
            self.count(RlhCounter::EcnMarked);
        }

        self.sign(header);
        self.count(RlhCounter::Forwarded);

        let actual = self.cost_source.actual_overhead(header, predicted);
        debug!(
            router_id = %self.router_id,
            next_hop = %next_hop_id,
            ttl = header.ttl(),
            budget_tokens = header.budget_tokens(),
            budget_usd_micros = header.budget_usd_micros(),
            overhead_tokens = predicted.0,
            overhead_usd_micros = predicted.1,
            ecn = congestion_detected,
            "Forwarded frame"
        );

        self.record_overhead_measurement(OverheadMeasurement::new(
            predicted.0,
            actual.0,
            predicted.1,
            actual.1,
        ));

        ForwardOutcome::Forwarded(frame)
    }

    /// Append a measurement and publish any aggregate that was recomputed.
    ///
    /// Gauges are published while the telemetry lock is held so the sink
    /// always ends up with the aggregates of the latest window.
    pub fn record_overhead_measurement(&self, measurement: OverheadMeasurement) {
        let mut telemetry = self.telemetry.lock();
        let recomputed = telemetry.record(measurement);
        if let Some(mape) = recomputed.mape {
            self.metrics.set_gauge(RlhGauge::OverheadMape, mape);
        }
        if let Some(p95) = recomputed.p95_factor {
            self.metrics.set_gauge(RlhGauge::OverheadP95Factor, p95);
        }
        drop(telemetry);
    }

    pub fn get_overhead_telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.lock().snapshot()
    }

    /// Most recent measurements, oldest first, at most `limit`.
    pub fn recent_measurements(&self, limit: usize) -> Vec<OverheadMeasurement> {
        let telemetry = self.telemetry.lock();
        let skip = telemetry.len().saturating_sub(limit);
        telemetry.iter().skip(skip).cloned().collect()
    }

    pub fn get_stats(&self) -> ProcessorStats {
        ProcessorStats {
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            dropped_ttl: self.counters.dropped_ttl.load(Ordering::Relaxed),
            dropped_budget: self.counters.dropped_budget.load(Ordering::Relaxed),
            ecn_marked: self.counters.ecn_marked.load(Ordering::Relaxed),
            overhead_model: *self.model.read(),
        }
    }

    pub fn get_overhead_model(&self) -> OverheadModel {
        *self.model.read()
    }

    /// Swap in a new model. Subsequent forwards use it; in-flight ones
    /// finish with the model they read. Non-finite coefficients are
    /// rejected and the active model is kept.
    pub fn update_overhead_model(&self, model: OverheadModel) -> Result<()> {
        model.validate()?;
        let previous = std::mem::replace(&mut *self.model.write(), model);
        self.metrics
            .set_gauge(RlhGauge::OverheadModelVersion, f64::from(model.version));
        info!(
            router_id = %self.router_id,
            from_version = previous.version,
            to_version = model.version,
            "Overhead model updated"
        );
        Ok(())
    }

    /// Session-open payload advertising the active model.
    pub fn capability_advertisement(&self) -> CapabilityAdvertisement {
        CapabilityAdvertisement::new(self.get_overhead_model())
    }

    /// Adopt a peer's model when its version differs from ours.
    ///
    /// Returns whether the active model changed.
    pub fn apply_peer_capability(&self, advertisement: &CapabilityAdvertisement) -> Result<bool> {
        let offered = advertisement.overhead_model;
        offered.validate()?;
        if offered.version == self.get_overhead_model().version {
            return Ok(false);
        }
        self.update_overhead_model(offered)?;
        Ok(true)
    }

    /// Session-update payload with current telemetry aggregates.
    pub fn telemetry_update(&self) -> TelemetryUpdate {
        TelemetryUpdate::from(self.get_overhead_telemetry())
    }

    fn authenticate(&self, header: &RlhHeader) -> bool {
        match &self.key {
            Some(key) => header.verify_hmac(key),
            None => header.is_unsigned(),
        }
    }

    fn sign(&self, header: &mut RlhHeader) {
        match &self.key {
            Some(key) => header.sign(key),
            None => header.clear_hmac(),
        }
    }

    fn count(&self, counter: RlhCounter) {
        self.counters.slot(counter).fetch_add(1, Ordering::Relaxed);
        self.metrics.increment(counter, 1);
    }
}

impl std::fmt::Debug for RlhProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlhProcessor")
            .field("router_id", &self.router_id)
            .field("insecure", &self.is_insecure())
            .field("model", &*self.model.read())
            .finish_non_exhaustive()
    }
}
