use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RlhError};
use crate::key::{LinkKey, HMAC_LEN};
use crate::qos::QosTier;

/// Packed header size in octets.
pub const HEADER_LEN: usize = 67;

/// Octets covered by the HMAC: everything except the trailing tag.
pub const SIGNED_LEN: usize = HEADER_LEN - HMAC_LEN;

/// Version tag emitted in the JSON admin form.
pub const RLH_VERSION: u8 = 1;

/// Independent bits of the 16-bit flag mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RlhFlag {
    /// Frame resumes an interrupted stream.
    Resume = 0x0001,
    /// Payload is a fragment.
    Frag = 0x0002,
    /// Congestion experienced on some hop.
    Ecn = 0x0004,
}

impl RlhFlag {
    pub const fn bit(self) -> u16 {
        self as u16
    }
}

/// Router Label Header.
///
/// Mutable per-frame routing state: destination, hop budget, two spend
/// budgets and flags, authenticated by a truncated HMAC-SHA256 tag over all
/// other fields. Any mutator invalidates the tag until [`RlhHeader::sign`]
/// is called again.
///
/// Wire layout (big-endian, 67 octets):
///
/// | field              | octets |
/// |--------------------|--------|
/// | dst_router_id      | 16     |
/// | egress_agent_id    | 8      |
/// | qos                | 1      |
/// | ttl                | 8      |
/// | budget_tokens      | 8      |
/// | budget_usd_micros  | 8      |
/// | flags              | 2      |
/// | hmac               | 16     |
///
/// The TTL is an 8-octet field even though peers treat it as a small hop
/// count; narrowing it would change the header size and break interop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RlhHeader {
    dst_router_id: Uuid,
    egress_agent_id: u64,
    qos: QosTier,
    ttl: u64,
    budget_tokens: u64,
    budget_usd_micros: u64,
    flags: u16,
    hmac: [u8; HMAC_LEN],
}

impl RlhHeader {
    /// Create a header with an initial allowance and no flags set.
    ///
    /// With a key the header is signed immediately. Without one the tag is
    /// all zeros, which only a peer running in insecure mode will accept.
    pub fn create(
        dst_router_id: Uuid,
        egress_agent_id: u64,
        qos: QosTier,
        ttl: u64,
        budget_tokens: u64,
        budget_usd_micros: u64,
        key: Option<&LinkKey>,
    ) -> Self {
        let mut header = Self {
            dst_router_id,
            egress_agent_id,
            qos,
            ttl,
            budget_tokens,
            budget_usd_micros,
            flags: 0,
            hmac: [0u8; HMAC_LEN],
        };
        if let Some(key) = key {
            header.sign(key);
        }
        header
    }

    pub fn dst_router_id(&self) -> Uuid {
        self.dst_router_id
    }

    pub fn egress_agent_id(&self) -> u64 {
        self.egress_agent_id
    }

    pub fn qos(&self) -> QosTier {
        self.qos
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn budget_tokens(&self) -> u64 {
        self.budget_tokens
    }

    pub fn budget_usd_micros(&self) -> u64 {
        self.budget_usd_micros
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn hmac(&self) -> &[u8; HMAC_LEN] {
        &self.hmac
    }

    /// Pack into the 67-octet wire form.
    pub fn pack(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..SIGNED_LEN].copy_from_slice(&self.signed_bytes());
        out[SIGNED_LEN..].copy_from_slice(&self.hmac);
        out
    }

    /// Exact inverse of [`RlhHeader::pack`].
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_LEN {
            return Err(RlhError::InvalidHeaderLength {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mut cursor = WireCursor::new(bytes);
        let dst_router_id = Uuid::from_bytes(cursor.take::<16>());
        let egress_agent_id = u64::from_be_bytes(cursor.take::<8>());
        let qos = QosTier::from_byte(cursor.take::<1>()[0])?;
        let ttl = u64::from_be_bytes(cursor.take::<8>());
        let budget_tokens = u64::from_be_bytes(cursor.take::<8>());
        let budget_usd_micros = u64::from_be_bytes(cursor.take::<8>());
        let flags = u16::from_be_bytes(cursor.take::<2>());
        let hmac = cursor.take::<HMAC_LEN>();

        Ok(Self {
            dst_router_id,
            egress_agent_id,
            qos,
            ttl,
            budget_tokens,
            budget_usd_micros,
            flags,
            hmac,
        })
    }

    /// The signed prefix: every field except the tag, in wire order.
    fn signed_bytes(&self) -> [u8; SIGNED_LEN] {
        let mut out = [0u8; SIGNED_LEN];
        let mut at = 0;
        let mut put = |chunk: &[u8]| {
            out[at..at + chunk.len()].copy_from_slice(chunk);
            at += chunk.len();
        };
        put(self.dst_router_id.as_bytes());
        put(&self.egress_agent_id.to_be_bytes());
        put(&[self.qos.to_byte()]);
        put(&self.ttl.to_be_bytes());
        put(&self.budget_tokens.to_be_bytes());
        put(&self.budget_usd_micros.to_be_bytes());
        put(&self.flags.to_be_bytes());
        out
    }

    pub fn compute_hmac(&self, key: &LinkKey) -> [u8; HMAC_LEN] {
        key.tag(&self.signed_bytes())
    }

    /// Recompute and store the tag.
    pub fn sign(&mut self, key: &LinkKey) {
        self.hmac = self.compute_hmac(key);
    }

    /// Constant-time check of the stored tag against `key`.
    pub fn verify_hmac(&self, key: &LinkKey) -> bool {
        key.verify(&self.signed_bytes(), &self.hmac)
    }

    /// Reset the tag to all zeros (keyless mode).
    pub fn clear_hmac(&mut self) {
        self.hmac = [0u8; HMAC_LEN];
    }

    /// True when the tag is all zeros (keyless mode).
    pub fn is_unsigned(&self) -> bool {
        self.hmac == [0u8; HMAC_LEN]
    }

    /// Consume one hop. Returns whether the header is still usable.
    pub fn decrement_ttl(&mut self) -> bool {
        if self.ttl > 0 {
            self.ttl -= 1;
        }
        self.ttl > 0
    }

    pub fn is_expired(&self) -> bool {
        self.ttl == 0
    }

    /// Spend from both budgets independently, flooring each at zero.
    ///
    /// The spend is kept even when it exhausts the header. Returns the
    /// post-spend [`RlhHeader::has_budget`].
    pub fn decrement_budget(&mut self, tokens: u64, usd_micros: u64) -> bool {
        self.budget_tokens = self.budget_tokens.saturating_sub(tokens);
        self.budget_usd_micros = self.budget_usd_micros.saturating_sub(usd_micros);
        self.has_budget()
    }

    /// Exact zero on either axis counts as exhausted.
    pub fn has_budget(&self) -> bool {
        self.budget_tokens > 0 && self.budget_usd_micros > 0
    }

    pub fn set_flag(&mut self, flag: RlhFlag) {
        self.flags |= flag.bit();
    }

    pub fn clear_flag(&mut self, flag: RlhFlag) {
        self.flags &= !flag.bit();
    }

    pub fn has_flag(&self, flag: RlhFlag) -> bool {
        self.flags & flag.bit() != 0
    }

    /// Point the header at the next hop.
    pub fn set_dst_router_id(&mut self, dst_router_id: Uuid) {
        self.dst_router_id = dst_router_id;
    }

    /// JSON-friendly admin form. Not a wire format.
    pub fn to_record(&self) -> HeaderRecord {
        HeaderRecord {
            version: RLH_VERSION,
            dst_router_id: self.dst_router_id.hyphenated().to_string(),
            egress_agent_id: self.egress_agent_id,
            qos: self.qos,
            ttl: self.ttl,
            budget_tokens: self.budget_tokens,
            budget_usd_micros: self.budget_usd_micros,
            flags: self.flags,
            hmac: hex::encode(self.hmac),
        }
    }

    /// Rebuild a header from its admin form. Only records at
    /// [`RLH_VERSION`] are accepted.
    pub fn from_record(record: &HeaderRecord) -> Result<Self> {
        if record.version != RLH_VERSION {
            return Err(RlhError::UnsupportedVersion(record.version));
        }
        let dst_router_id = Uuid::parse_str(&record.dst_router_id)?;
        let raw = hex::decode(&record.hmac)?;
        let hmac: [u8; HMAC_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| RlhError::InvalidHmacLength(raw.len()))?;

        Ok(Self {
            dst_router_id,
            egress_agent_id: record.egress_agent_id,
            qos: record.qos,
            ttl: record.ttl,
            budget_tokens: record.budget_tokens,
            budget_usd_micros: record.budget_usd_micros,
            flags: record.flags,
            hmac,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: HeaderRecord = serde_json::from_str(json)?;
        Self::from_record(&record)
    }
}

/// Administrative/interop JSON form of a header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub version: u8,
    pub dst_router_id: String,
    pub egress_agent_id: u64,
    pub qos: QosTier,
    pub ttl: u64,
    pub budget_tokens: u64,
    pub budget_usd_micros: u64,
    pub flags: u16,
    pub hmac: String,
}

/// Reads fixed-size chunks off a buffer whose length was checked up front.
struct WireCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LinkKey {
        LinkKey::new(b"link-key-between-r1-and-r2".to_vec())
    }

    fn dst() -> Uuid {
        Uuid::parse_str("6f1c2d3e-4a5b-4c6d-8e7f-0123456789ab").unwrap()
    }

    fn signed_header() -> RlhHeader {
        RlhHeader::create(dst(), 42, QosTier::Gold, 64, 1000, 10_000, Some(&key()))
    }

    #[test]
    fn pack_is_67_octets_in_field_order() {
        let header = RlhHeader::create(dst(), 0x0102, QosTier::Silver, 5, 7, 9, None);
        let bytes = header.pack();

        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..16], dst().as_bytes());
        assert_eq!(&bytes[16..24], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(bytes[24], b's');
        assert_eq!(&bytes[25..33], &5u64.to_be_bytes());
        assert_eq!(&bytes[33..41], &7u64.to_be_bytes());
        assert_eq!(&bytes[41..49], &9u64.to_be_bytes());
        assert_eq!(&bytes[49..51], &[0, 0]);
        assert_eq!(&bytes[51..], &[0u8; 16]);
    }

    #[test]
    fn unpack_inverts_pack() {
        let mut header = signed_header();
        header.set_flag(RlhFlag::Frag);
        header.sign(&key());

        let restored = RlhHeader::unpack(&header.pack()).unwrap();
        assert_eq!(restored, header);
        assert!(restored.verify_hmac(&key()));
    }

    #[test]
    fn unpack_rejects_wrong_length() {
        let bytes = signed_header().pack();
        let err = RlhHeader::unpack(&bytes[..66]).unwrap_err();
        assert!(matches!(
            err,
            RlhError::InvalidHeaderLength {
                expected: 67,
                actual: 66
            }
        ));

        let mut long = bytes.to_vec();
        long.push(0);
        assert!(RlhHeader::unpack(&long).is_err());
    }

    #[test]
    fn unpack_rejects_unknown_qos() {
        let mut bytes = signed_header().pack();
        bytes[24] = b'p';
        let err = RlhHeader::unpack(&bytes).unwrap_err();
        assert!(matches!(err, RlhError::UnknownQos(b'p')));
    }

    #[test]
    fn create_without_key_leaves_zero_tag() {
        let header = RlhHeader::create(dst(), 1, QosTier::Bronze, 3, 1, 1, None);
        assert!(header.is_unsigned());
        assert!(!header.verify_hmac(&key()));
    }

    #[test]
    fn signed_header_verifies() {
        let header = signed_header();
        assert!(!header.is_unsigned());
        assert!(header.verify_hmac(&key()));
        assert!(!header.verify_hmac(&LinkKey::new(b"wrong".to_vec())));
    }

    #[test]
    fn any_flipped_octet_breaks_verification() {
        let packed = signed_header().pack();
        for i in 0..HEADER_LEN {
            let mut tampered = packed;
            tampered[i] ^= 0x01;
            // A flipped QoS byte may no longer decode at all
            if let Ok(header) = RlhHeader::unpack(&tampered) {
                assert!(!header.verify_hmac(&key()), "octet {} flip undetected", i);
            }
        }
    }

    #[test]
    fn mutation_invalidates_until_resigned() {
        let mut header = signed_header();
        header.decrement_budget(1, 1);
        assert!(!header.verify_hmac(&key()));
        header.sign(&key());
        assert!(header.verify_hmac(&key()));
    }

    #[test]
    fn ttl_of_one_expires_on_first_decrement() {
        let mut header = RlhHeader::create(dst(), 1, QosTier::Gold, 1, 10, 10, None);
        assert!(!header.is_expired());
        assert!(!header.decrement_ttl());
        assert!(header.is_expired());
        // Floor at zero
        assert!(!header.decrement_ttl());
        assert_eq!(header.ttl(), 0);
    }

    #[test]
    fn ttl_decrement_reports_remaining_usability() {
        let mut header = RlhHeader::create(dst(), 1, QosTier::Gold, 3, 10, 10, None);
        assert!(header.decrement_ttl());
        assert_eq!(header.ttl(), 2);
    }

    #[test]
    fn budget_axes_floor_independently() {
        let mut header = RlhHeader::create(dst(), 1, QosTier::Gold, 3, 100, 50, None);
        assert!(!header.decrement_budget(10, 80));
        assert_eq!(header.budget_tokens(), 90);
        assert_eq!(header.budget_usd_micros(), 0);

        // Spend stays applied, no borrowing across axes
        assert!(!header.decrement_budget(10, 0));
        assert_eq!(header.budget_tokens(), 80);
    }

    #[test]
    fn exact_zero_is_exhausted() {
        let mut header = RlhHeader::create(dst(), 1, QosTier::Gold, 3, 20, 200, None);
        assert!(header.has_budget());
        assert!(!header.decrement_budget(20, 200));
        assert_eq!(header.budget_tokens(), 0);
        assert_eq!(header.budget_usd_micros(), 0);
    }

    #[test]
    fn flags_are_independent_bits() {
        let mut header = RlhHeader::create(dst(), 1, QosTier::Gold, 3, 1, 1, None);
        header.set_flag(RlhFlag::Ecn);
        header.set_flag(RlhFlag::Resume);
        assert_eq!(header.flags(), 0x0005);
        assert!(header.has_flag(RlhFlag::Ecn));
        assert!(!header.has_flag(RlhFlag::Frag));

        header.clear_flag(RlhFlag::Ecn);
        assert!(!header.has_flag(RlhFlag::Ecn));
        assert!(header.has_flag(RlhFlag::Resume));
    }

    #[test]
    fn json_record_round_trip() {
        let header = signed_header();
        let json = header.to_json().unwrap();
        assert!(json.contains("\"dst_router_id\":\"6f1c2d3e-4a5b-4c6d-8e7f-0123456789ab\""));
        assert!(json.contains("\"qos\":\"gold\""));
        assert!(json.contains("\"version\":1"));

        let restored = RlhHeader::from_json(&json).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn record_from_other_version_is_rejected() {
        let mut record = signed_header().to_record();
        record.version = RLH_VERSION + 1;
        assert!(matches!(
            RlhHeader::from_record(&record),
            Err(RlhError::UnsupportedVersion(2))
        ));

        let json = signed_header().to_json().unwrap().replace(
            &format!("\"version\":{}", RLH_VERSION),
            "\"version\":0",
        );
        assert!(matches!(
            RlhHeader::from_json(&json),
            Err(RlhError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn record_with_short_hmac_is_rejected() {
        let mut record = signed_header().to_record();
        record.hmac = "abcd".into();
        assert!(matches!(
            RlhHeader::from_record(&record),
            Err(RlhError::InvalidHmacLength(2))
        ));

        record.hmac = hex::encode([0u8; 16]);
        record.dst_router_id = "not-a-uuid".into();
        assert!(matches!(
            RlhHeader::from_record(&record),
            Err(RlhError::InvalidRouterId(_))
        ));
    }
}
