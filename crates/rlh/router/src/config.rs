//! Router configuration.
//!
//! Layered as defaults, then an optional file, then `RLH__*` environment
//! variables (for example `RLH__TELEMETRY__CAPACITY=5000`).

use rlh_types::{LinkKey, OverheadModel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RouterError};
use crate::telemetry::{DEFAULT_CAPACITY, MAPE_MIN_SAMPLES, P95_MIN_SAMPLES};

/// Main router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// This router's identity (hyphenated UUID).
    pub router_id: Uuid,

    /// Per-link signing key, hex encoded.
    #[serde(default)]
    pub signing_key_hex: Option<String>,

    /// Accept and emit all-zero HMAC tags when no key is configured.
    #[serde(default)]
    pub insecure_allow_unsigned: bool,

    /// Overhead model active at startup.
    #[serde(default)]
    pub overhead_model: OverheadModel,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router_id: Uuid::nil(),
            signing_key_hex: None,
            insecure_allow_unsigned: false,
            overhead_model: OverheadModel::default(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RouterConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RLH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: RouterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// A keyless development configuration for the given router.
    pub fn insecure(router_id: Uuid) -> Self {
        Self {
            router_id,
            insecure_allow_unsigned: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.router_id.is_nil() {
            return Err(RouterError::Config("router_id must be set".into()));
        }
        self.signing_key()?;
        self.overhead_model.validate()?;
        self.telemetry.validate()
    }

    /// Decode the configured key, if any.
    pub fn signing_key(&self) -> Result<Option<LinkKey>> {
        match &self.signing_key_hex {
            Some(encoded) => {
                let key = LinkKey::from_hex(encoded)?;
                if key.as_bytes().is_empty() {
                    return Err(RouterError::Config("signing key is empty".into()));
                }
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }
}

/// Telemetry window and aggregate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default = "default_mape_min_samples")]
    pub mape_min_samples: usize,

    #[serde(default = "default_p95_min_samples")]
    pub p95_min_samples: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            mape_min_samples: MAPE_MIN_SAMPLES,
            p95_min_samples: P95_MIN_SAMPLES,
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(RouterError::Config("telemetry.capacity must be > 0".into()));
        }
        if self.mape_min_samples == 0 || self.p95_min_samples == 0 {
            return Err(RouterError::Config(
                "telemetry sample thresholds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_mape_min_samples() -> usize {
    MAPE_MIN_SAMPLES
}

fn default_p95_min_samples() -> usize {
    P95_MIN_SAMPLES
}

fn default_log_level() -> String {
    "info".to_string()
}
