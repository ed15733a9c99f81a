use crate::error::{Result, RlhError};
use crate::header::{RlhHeader, HEADER_LEN};

/// One header paired with one opaque payload.
///
/// The payload belongs to the application layer and is never inspected
/// here. On the wire the payload simply fills the remainder after the
/// 67-octet header; there is no length prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RlhFrame {
    header: RlhHeader,
    payload: Vec<u8>,
}

impl RlhFrame {
    pub fn new(header: RlhHeader, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    pub fn header(&self) -> &RlhHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut RlhHeader {
        &mut self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (RlhHeader, Vec<u8>) {
        (self.header, self.payload)
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header.pack());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(RlhError::FrameTooShort {
                minimum: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let (head, payload) = bytes.split_at(HEADER_LEN);
        Ok(Self {
            header: RlhHeader::unpack(head)?,
            payload: payload.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::LinkKey;
    use crate::qos::QosTier;
    use uuid::Uuid;

    fn header() -> RlhHeader {
        RlhHeader::create(
            Uuid::new_v4(),
            7,
            QosTier::Silver,
            8,
            500,
            5000,
            Some(&LinkKey::new(b"k".to_vec())),
        )
    }

    #[test]
    fn payload_follows_header_without_prefix() {
        let frame = RlhFrame::new(header(), b"{\"op\":\"infer\"}".to_vec());
        let bytes = frame.pack();
        assert_eq!(bytes.len(), HEADER_LEN + 14);
        assert_eq!(&bytes[..HEADER_LEN], &frame.header().pack());
        assert_eq!(&bytes[HEADER_LEN..], frame.payload());

        assert_eq!(RlhFrame::unpack(&bytes).unwrap(), frame);
    }

    #[test]
    fn empty_payload_is_allowed() {
        let frame = RlhFrame::new(header(), Vec::new());
        let restored = RlhFrame::unpack(&frame.pack()).unwrap();
        assert!(restored.payload().is_empty());
    }

    #[test]
    fn short_input_is_rejected() {
        let err = RlhFrame::unpack(&[0u8; 66]).unwrap_err();
        assert!(matches!(
            err,
            RlhError::FrameTooShort {
                minimum: 67,
                actual: 66
            }
        ));
    }

    #[test]
    fn header_decode_errors_propagate() {
        let mut bytes = RlhFrame::new(header(), b"x".to_vec()).pack();
        bytes[24] = 0;
        assert!(matches!(
            RlhFrame::unpack(&bytes),
            Err(RlhError::UnknownQos(0))
        ));
    }
}
