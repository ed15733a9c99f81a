//! Property tests: wire round-trip and budget monotonicity.

use proptest::prelude::*;
use rlh_types::{LinkKey, QosTier, RlhFlag, RlhFrame, RlhHeader};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_qos() -> impl Strategy<Value = QosTier> {
    prop_oneof![
        Just(QosTier::Gold),
        Just(QosTier::Silver),
        Just(QosTier::Bronze),
    ]
}

fn arb_key() -> impl Strategy<Value = LinkKey> {
    prop::collection::vec(any::<u8>(), 1..64).prop_map(LinkKey::new)
}

fn arb_header() -> impl Strategy<Value = (RlhHeader, LinkKey)> {
    (
        any::<u128>(),
        any::<u64>(),
        arb_qos(),
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        any::<bool>(),
        arb_key(),
    )
        .prop_map(|(id, egress, qos, ttl, tokens, usd, ecn, key)| {
            let mut header = RlhHeader::create(
                Uuid::from_u128(id),
                egress,
                qos,
                ttl,
                tokens,
                usd,
                Some(&key),
            );
            if ecn {
                header.set_flag(RlhFlag::Ecn);
                header.sign(&key);
            }
            (header, key)
        })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn header_round_trips_and_verifies((header, key) in arb_header()) {
        let restored = RlhHeader::unpack(&header.pack()).unwrap();
        prop_assert_eq!(&restored, &header);
        prop_assert!(restored.verify_hmac(&key));
    }

    #[test]
    fn frame_round_trips(
        (header, _key) in arb_header(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let frame = RlhFrame::new(header, payload);
        prop_assert_eq!(RlhFrame::unpack(&frame.pack()).unwrap(), frame);
    }

    #[test]
    fn budgets_never_increase(
        (mut header, _key) in arb_header(),
        spends in prop::collection::vec((any::<u64>(), any::<u64>()), 1..20),
    ) {
        for (tokens, usd) in spends {
            let before = (header.budget_tokens(), header.budget_usd_micros());
            let has_budget = header.decrement_budget(tokens, usd);
            prop_assert!(header.budget_tokens() <= before.0);
            prop_assert!(header.budget_usd_micros() <= before.1);
            prop_assert_eq!(
                has_budget,
                header.budget_tokens() > 0 && header.budget_usd_micros() > 0
            );
        }
    }

    #[test]
    fn ttl_strictly_decreases_until_zero((mut header, _key) in arb_header()) {
        let before = header.ttl();
        let usable = header.decrement_ttl();
        prop_assert_eq!(header.ttl(), before.saturating_sub(1));
        prop_assert_eq!(usable, !header.is_expired());
    }
}
