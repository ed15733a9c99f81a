use anyhow::{bail, Context};
use rlh_router::{
    Allowance, CapabilityAdvertisement, ForwardOutcome, IngressDecision, RlhProcessor,
    RouterConfig,
};
use rlh_types::{LinkKey, OverheadModel, QosTier, RlhFrame, RlhHeader, HEADER_LEN};
use serde_json::json;
use uuid::Uuid;

pub fn allowance(ttl: u64, budget_tokens: u64, budget_usd_micros: u64) -> Allowance {
    Allowance {
        ttl,
        budget_tokens,
        budget_usd_micros,
    }
}

fn decode_frame(packed: &str) -> anyhow::Result<RlhFrame> {
    let bytes = hex::decode(packed.trim()).context("packed input is not valid hex")?;
    if bytes.len() < HEADER_LEN {
        bail!(
            "input is {} octets, a header needs {}",
            bytes.len(),
            HEADER_LEN
        );
    }
    Ok(RlhFrame::unpack(&bytes)?)
}

pub fn decode(packed: &str) -> anyhow::Result<String> {
    let frame = decode_frame(packed)?;
    let output = json!({
        "header": frame.header().to_record(),
        "payload_len": frame.payload().len(),
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn verify(key: &str, packed: &str) -> anyhow::Result<String> {
    let key = LinkKey::from_hex(key).context("link key is not valid hex")?;
    let frame = decode_frame(packed)?;
    Ok(json!({ "valid": frame.header().verify_hmac(&key) }).to_string())
}

pub fn sign(
    key: &str,
    dst: &str,
    egress: u64,
    qos: &str,
    allowance: Allowance,
) -> anyhow::Result<String> {
    let key = LinkKey::from_hex(key).context("link key is not valid hex")?;
    let dst = Uuid::parse_str(dst).context("destination is not a UUID")?;
    let qos: QosTier = qos.parse()?;
    let header = RlhHeader::create(
        dst,
        egress,
        qos,
        allowance.ttl,
        allowance.budget_tokens,
        allowance.budget_usd_micros,
        Some(&key),
    );
    Ok(hex::encode(header.pack()))
}

/// One hop through a router built from `config`: ingress authentication
/// and classification first, then the forwarding step. Frames that fail
/// authentication are never re-signed.
pub fn forward(
    config: Option<&str>,
    packed: &str,
    next_hop: &str,
    payload: (u64, u64),
    congested: bool,
) -> anyhow::Result<String> {
    let config = RouterConfig::load(config)?;
    let processor = RlhProcessor::from_config(&config)?;
    let next_hop = Uuid::parse_str(next_hop).context("next hop is not a UUID")?;
    let frame = decode_frame(packed)?;

    let frame = match processor.process_incoming_frame(frame) {
        None => return Ok(json!({ "outcome": "rejected" }).to_string()),
        Some(IngressDecision::LocalDeliver(frame)) => {
            let output = json!({
                "outcome": "local_deliver",
                "header": frame.header().to_record(),
            });
            return Ok(serde_json::to_string_pretty(&output)?);
        }
        Some(IngressDecision::Forward(frame)) => frame,
    };

    let outcome = processor.forward_frame(frame, next_hop, payload.0, payload.1, congested);
    let output = match outcome {
        ForwardOutcome::Forwarded(frame) => json!({
            "outcome": "forwarded",
            "header": frame.header().to_record(),
            "packed": hex::encode(frame.pack()),
        }),
        ForwardOutcome::DroppedTtl => json!({ "outcome": "dropped_ttl" }),
        ForwardOutcome::DroppedBudget => json!({ "outcome": "dropped_budget" }),
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn model() -> anyhow::Result<String> {
    let advertisement = CapabilityAdvertisement::new(OverheadModel::default());
    Ok(serde_json::to_string_pretty(&advertisement)?)
}
