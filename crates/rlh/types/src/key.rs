use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::Result;

/// Length of the truncated HMAC tag carried on the wire.
pub const HMAC_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Per-link signing key shared by two adjacent routers.
///
/// Provisioned externally. The key material never appears in `Debug`
/// output so it cannot leak through structured logging.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkKey(Vec<u8>);

impl LinkKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a key from its hex representation (config and CLI form).
    pub fn from_hex(encoded: &str) -> Result<Self> {
        Ok(Self(hex::decode(encoded.trim())?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// HMAC-SHA256 over `message`, truncated to the first 16 octets.
    pub fn tag(&self, message: &[u8]) -> [u8; HMAC_LEN] {
        let mut mac =
            HmacSha256::new_from_slice(&self.0).expect("HMAC accepts keys of any length");
        mac.update(message);
        let digest = mac.finalize().into_bytes();
        let mut out = [0u8; HMAC_LEN];
        out.copy_from_slice(&digest[..HMAC_LEN]);
        out
    }

    /// Recompute the tag over `message` and compare in constant time.
    pub fn verify(&self, message: &[u8], tag: &[u8; HMAC_LEN]) -> bool {
        let expected = self.tag(message);
        bool::from(expected.ct_eq(tag))
    }
}

impl fmt::Debug for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkKey(<{} bytes redacted>)", self.0.len())
    }
}
