//! Metrics sinks for forwarding counters and telemetry gauges.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};

use crate::error::Result;

/// Counters exported by a processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RlhCounter {
    Forwarded,
    DroppedTtl,
    DroppedBudget,
    EcnMarked,
}

impl RlhCounter {
    pub const ALL: [RlhCounter; 4] = [
        RlhCounter::Forwarded,
        RlhCounter::DroppedTtl,
        RlhCounter::DroppedBudget,
        RlhCounter::EcnMarked,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RlhCounter::Forwarded => "forwarded",
            RlhCounter::DroppedTtl => "dropped_ttl",
            RlhCounter::DroppedBudget => "dropped_budget",
            RlhCounter::EcnMarked => "ecn_marked",
        }
    }

    fn help(self) -> &'static str {
        match self {
            RlhCounter::Forwarded => "Frames classified for forwarding or forwarded",
            RlhCounter::DroppedTtl => "Frames dropped because the TTL ran out",
            RlhCounter::DroppedBudget => "Frames dropped because a budget ran out",
            RlhCounter::EcnMarked => "Frames marked congestion-experienced",
        }
    }
}

/// Gauges exported by a processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RlhGauge {
    OverheadModelVersion,
    OverheadMape,
    OverheadP95Factor,
}

impl RlhGauge {
    pub const ALL: [RlhGauge; 3] = [
        RlhGauge::OverheadModelVersion,
        RlhGauge::OverheadMape,
        RlhGauge::OverheadP95Factor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RlhGauge::OverheadModelVersion => "overhead_model_version",
            RlhGauge::OverheadMape => "overhead_mape_7d",
            RlhGauge::OverheadP95Factor => "overhead_p95_factor",
        }
    }

    fn help(self) -> &'static str {
        match self {
            RlhGauge::OverheadModelVersion => "Version of the active overhead model",
            RlhGauge::OverheadMape => "Mean absolute percentage error of overhead predictions",
            RlhGauge::OverheadP95Factor => "95th percentile actual/predicted overhead factor",
        }
    }
}

/// Destination for processor counters and gauges.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: RlhCounter, by: u64);

    fn set_gauge(&self, gauge: RlhGauge, value: f64);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn increment(&self, _counter: RlhCounter, _by: u64) {}

    fn set_gauge(&self, _gauge: RlhGauge, _value: f64) {}
}

/// Keeps the latest values in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    counters: Mutex<HashMap<RlhCounter, u64>>,
    gauges: Mutex<HashMap<RlhGauge, f64>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, counter: RlhCounter) -> u64 {
        self.counters.lock().get(&counter).copied().unwrap_or(0)
    }

    /// `None` until the gauge has been set at least once.
    pub fn gauge(&self, gauge: RlhGauge) -> Option<f64> {
        self.gauges.lock().get(&gauge).copied()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn increment(&self, counter: RlhCounter, by: u64) {
        *self.counters.lock().entry(counter).or_insert(0) += by;
    }

    fn set_gauge(&self, gauge: RlhGauge, value: f64) {
        self.gauges.lock().insert(gauge, value);
    }
}

/// Prometheus-backed sink; one registry per processor.
pub struct PrometheusMetricsSink {
    registry: Arc<Registry>,
    counters: HashMap<RlhCounter, IntCounter>,
    gauges: HashMap<RlhGauge, Gauge>,
}

impl PrometheusMetricsSink {
    /// Create a sink with the default prefix "rlh"
    pub fn new() -> Result<Self> {
        Self::with_prefix("rlh")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let registry = Arc::new(Registry::new_custom(Some(prefix.to_string()), None)?);

        let mut counters = HashMap::new();
        for counter in RlhCounter::ALL {
            let metric = IntCounter::with_opts(Opts::new(
                format!("{}_total", counter.name()),
                counter.help(),
            ))?;
            registry.register(Box::new(metric.clone()))?;
            counters.insert(counter, metric);
        }

        let mut gauges = HashMap::new();
        for gauge in RlhGauge::ALL {
            let metric = Gauge::with_opts(Opts::new(gauge.name(), gauge.help()))?;
            registry.register(Box::new(metric.clone()))?;
            gauges.insert(gauge, metric);
        }

        Ok(Self {
            registry,
            counters,
            gauges,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::RouterError::Metrics(e.to_string()))
    }

    /// Get the underlying registry for custom metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn increment(&self, counter: RlhCounter, by: u64) {
        if let Some(metric) = self.counters.get(&counter) {
            metric.inc_by(by);
        }
    }

    fn set_gauge(&self, gauge: RlhGauge, value: f64) {
        if let Some(metric) = self.gauges.get(&gauge) {
            metric.set(value);
        }
    }
}
