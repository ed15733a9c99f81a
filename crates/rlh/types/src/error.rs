use thiserror::Error;

/// Errors raised while decoding or constructing RLH wire objects.
///
/// Only malformed input is an error here. HMAC mismatches and TTL/budget
/// exhaustion are routing outcomes, reported by the processor without
/// raising.
#[derive(Error, Debug)]
pub enum RlhError {
    #[error("invalid header length: expected {expected} octets, got {actual}")]
    InvalidHeaderLength { expected: usize, actual: usize },

    #[error("unknown QoS byte: 0x{0:02x}")]
    UnknownQos(u8),

    #[error("unknown QoS tier name: {0}")]
    UnknownQosName(String),

    #[error("frame too short: need at least {minimum} octets, got {actual}")]
    FrameTooShort { minimum: usize, actual: usize },

    #[error("invalid router id: {0}")]
    InvalidRouterId(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid hmac length: expected 16 octets, got {0}")]
    InvalidHmacLength(usize),

    #[error("unsupported header version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid overhead model: {0}")]
    InvalidModel(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<uuid::Error> for RlhError {
    fn from(err: uuid::Error) -> Self {
        RlhError::InvalidRouterId(err.to_string())
    }
}

impl From<hex::FromHexError> for RlhError {
    fn from(err: hex::FromHexError) -> Self {
        RlhError::InvalidHex(err.to_string())
    }
}

/// Result alias for RLH wire operations.
pub type Result<T> = std::result::Result<T, RlhError>;
