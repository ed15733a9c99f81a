use rlh_types::RlhError;
use thiserror::Error;

/// Errors from building or configuring a router.
///
/// Forwarding itself never errors: authentication failures and TTL/budget
/// exhaustion are reported as outcomes.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no signing key configured and insecure mode is disabled")]
    MissingSigningKey,

    #[error("configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("rlh error: {0}")]
    Rlh(#[from] RlhError),
}

impl From<prometheus::Error> for RouterError {
    fn from(err: prometheus::Error) -> Self {
        RouterError::Metrics(err.to_string())
    }
}

/// Result alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
