//! Router Label Header (RLH): data-plane encapsulation for federated
//! multi-hop inference routing.
//!
//! Every forwarded request/response frame carries a fixed 67-octet header
//! that bounds the remaining hops, carries two shrinking spend budgets
//! (model tokens and USD micro-units), signals congestion, and is
//! authenticated hop-by-hop with a truncated HMAC-SHA256 tag.
//!
//! This crate holds the wire-level data model only. The forwarding engine
//! lives in `rlh-router`.

#![deny(unsafe_code)]

pub mod error;
pub mod frame;
pub mod header;
pub mod key;
pub mod overhead;
pub mod qos;

pub use error::{Result, RlhError};
pub use frame::RlhFrame;
pub use header::{HeaderRecord, RlhFlag, RlhHeader, HEADER_LEN, RLH_VERSION, SIGNED_LEN};
pub use key::{LinkKey, HMAC_LEN};
pub use overhead::OverheadModel;
pub use qos::QosTier;
