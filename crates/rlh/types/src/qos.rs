use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RlhError;

/// Service class carried in every header. Fixed for the life of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QosTier {
    Gold,
    Silver,
    Bronze,
}

impl QosTier {
    /// Wire byte: the ASCII first letter of the tier name.
    pub fn to_byte(self) -> u8 {
        match self {
            QosTier::Gold => b'g',
            QosTier::Silver => b's',
            QosTier::Bronze => b'b',
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, RlhError> {
        match byte {
            b'g' => Ok(QosTier::Gold),
            b's' => Ok(QosTier::Silver),
            b'b' => Ok(QosTier::Bronze),
            other => Err(RlhError::UnknownQos(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QosTier::Gold => "gold",
            QosTier::Silver => "silver",
            QosTier::Bronze => "bronze",
        }
    }
}

impl fmt::Display for QosTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QosTier {
    type Err = RlhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gold" => Ok(QosTier::Gold),
            "silver" => Ok(QosTier::Silver),
            "bronze" => Ok(QosTier::Bronze),
            other => Err(RlhError::UnknownQosName(other.to_string())),
        }
    }
}
