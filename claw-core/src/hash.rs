//! Protocol Hashes
//!
//! Every hash here is `keccak256(abi.encode(...))` over a fixed parameter
//! list, so the relayer, bots and the on-chain books agree bit for bit.
//! Inputs are canonicalized first.

use alloy_primitives::keccak256;
use alloy_sol_types::SolValue;

use crate::canon::{
    assert_positive, assert_strictly_sorted, canonical_claim, canonical_intent, normalize_text,
    unique_sorted,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{Address, ClaimPayload, ExecutionRoute, ProtocolScope, TradeIntent, B256, U256};

/// Claim hash over
/// `(string schemaId, string sourceType, string sourceRef, string selector,
///   string extracted, string extractedType, uint64 timestamp, bytes32 responseHash,
///   string evidenceType, string evidenceURI, address crawler, string notes)`
pub fn claim_hash(payload: &ClaimPayload) -> ProtocolResult<B256> {
    let v = canonical_claim(payload)?;
    let encoded = (
        v.schema_id,
        v.source_type,
        v.source_ref,
        v.selector,
        v.extracted,
        v.extracted_type,
        v.timestamp,
        v.response_hash,
        v.evidence_type,
        v.evidence_uri,
        v.crawler,
        v.notes,
    )
        .abi_encode_params();
    Ok(keccak256(encoded))
}

/// Intent hash over
/// `(string intentVersion, address vault, string action, address tokenIn,
///   address tokenOut, uint256 amountIn, uint256 minAmountOut, uint64 deadline,
///   uint16 maxSlippageBps, bytes32 snapshotHash)`
pub fn intent_hash(intent: &TradeIntent) -> ProtocolResult<B256> {
    let v = canonical_intent(intent)?;
    let encoded = (
        v.intent_version,
        v.vault,
        v.action.as_str().to_string(),
        v.token_in,
        v.token_out,
        v.amount_in,
        v.min_amount_out,
        v.deadline,
        v.max_slippage_bps,
        v.snapshot_hash,
    )
        .abi_encode_params();
    Ok(keccak256(encoded))
}

/// Snapshot hash over `(uint64 epochId, bytes32[] orderedClaimHashes)`.
///
/// The list must already be strictly ascending. This is the form the
/// on-chain snapshot book checks.
pub fn snapshot_hash(epoch_id: u64, ordered_claim_hashes: &[B256]) -> ProtocolResult<B256> {
    assert_strictly_sorted(ordered_claim_hashes, "orderedClaimHashes")?;
    let encoded = (epoch_id, ordered_claim_hashes.to_vec()).abi_encode_params();
    Ok(keccak256(encoded))
}

/// Sort and deduplicate, then [`snapshot_hash`]
pub fn snapshot_hash_from_unordered(epoch_id: u64, claim_hashes: &[B256]) -> ProtocolResult<B256> {
    snapshot_hash(epoch_id, &unique_sorted(claim_hashes))
}

/// Allowlist hash binding an execution route to an intent, over
/// `(address tokenIn, address tokenOut, uint256 quoteAmountOut,
///   uint256 minAmountOut, address adapter, bytes32 adapterDataHash)`
pub fn intent_execution_allowlist_hash(
    token_in: Address,
    token_out: Address,
    quote_amount_out: U256,
    min_amount_out: U256,
    adapter: Address,
    adapter_data_hash: B256,
) -> B256 {
    let encoded = (
        token_in,
        token_out,
        quote_amount_out,
        min_amount_out,
        adapter,
        adapter_data_hash,
    )
        .abi_encode_params();
    keccak256(encoded)
}

/// Same as [`intent_execution_allowlist_hash`] but from raw adapter calldata
pub fn intent_execution_call_hash(
    token_in: Address,
    token_out: Address,
    quote_amount_out: U256,
    min_amount_out: U256,
    adapter: Address,
    adapter_data: &[u8],
) -> B256 {
    intent_execution_allowlist_hash(
        token_in,
        token_out,
        quote_amount_out,
        min_amount_out,
        adapter,
        keccak256(adapter_data),
    )
}

/// Allowlist hash for a route. An explicit `adapterDataHash` wins over
/// calldata; one of the two is required.
pub fn route_allowlist_hash(route: &ExecutionRoute) -> ProtocolResult<B256> {
    assert_positive(route.quote_amount_out, "quoteAmountOut")?;
    assert_positive(route.min_amount_out, "minAmountOut")?;

    let adapter_data_hash = match (&route.adapter_data_hash, &route.adapter_data) {
        (Some(hash), _) => *hash,
        (None, Some(data)) => keccak256(data),
        (None, None) => {
            return Err(ProtocolError::invalid(
                "adapterData or adapterDataHash is required",
            ))
        }
    };

    Ok(intent_execution_allowlist_hash(
        route.token_in,
        route.token_out,
        route.quote_amount_out,
        route.min_amount_out,
        route.adapter,
        adapter_data_hash,
    ))
}

/// keccak256 of the NFC-trimmed UTF-8 reason text
pub fn reason_hash(reason: &str) -> B256 {
    keccak256(normalize_text(reason).as_bytes())
}

/// Scope key over `(string fundId, string roomId, uint64 epochId)`
pub fn scope_key(scope: &ProtocolScope) -> B256 {
    let encoded = (
        normalize_text(&scope.fund_id),
        normalize_text(&scope.room_id),
        scope.epoch_id,
    )
        .abi_encode_params();
    keccak256(encoded)
}

/// Snapshot hash bound to a scope, over
/// `(string fundId, string roomId, uint64 epochId, bytes32 snapshotHash)`
pub fn scoped_snapshot_hash(scope: &ProtocolScope, snapshot_hash: B256) -> B256 {
    let encoded = (
        normalize_text(&scope.fund_id),
        normalize_text(&scope.room_id),
        scope.epoch_id,
        snapshot_hash,
    )
        .abi_encode_params();
    keccak256(encoded)
}

pub fn assert_same_scope(expected: &ProtocolScope, received: &ProtocolScope) -> ProtocolResult<()> {
    let left = scope_key(expected);
    let right = scope_key(received);
    if left != right {
        return Err(ProtocolError::ScopeMismatch {
            expected: left.to_string(),
            received: right.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    fn sample_claim() -> ClaimPayload {
        ClaimPayload {
            schema_id: "reddit.post.v1".into(),
            source_type: "WEB".into(),
            source_ref: "https://www.reddit.com/r/ethereum/comments/abc".into(),
            selector: "$.data.title".into(),
            extracted: "ETH to the moon".into(),
            extracted_type: "string".into(),
            timestamp: U256::from(1_700_000_000u64),
            response_hash: B256::repeat_byte(0x42),
            evidence_type: "url".into(),
            evidence_uri: "ipfs://bafy".into(),
            crawler: Address::repeat_byte(0xcc),
            notes: None,
        }
    }

    fn sample_intent() -> TradeIntent {
        TradeIntent {
            intent_version: "v1".into(),
            vault: Address::repeat_byte(0xa1),
            action: "BUY".into(),
            token_in: Address::repeat_byte(0xb1),
            token_out: Address::repeat_byte(0xc1),
            amount_in: U256::from(1_000_000u64),
            min_amount_out: U256::from(990_000u64),
            deadline: U256::from(4_102_444_800u64),
            max_slippage_bps: U256::from(100u64),
            snapshot_hash: B256::repeat_byte(0x11),
            reason: None,
        }
    }

    #[test]
    fn test_claim_hash_ignores_cosmetic_text_variance() {
        let base = claim_hash(&sample_claim()).unwrap();

        let mut padded = sample_claim();
        padded.schema_id = "  reddit.post.v1\n".into();
        padded.extracted = "\tETH to the moon ".into();
        padded.notes = Some("   ".into());
        assert_eq!(claim_hash(&padded).unwrap(), base);

        let mut composed = sample_claim();
        composed.extracted = "caf\u{00e9}".into();
        let mut decomposed = sample_claim();
        decomposed.extracted = "cafe\u{0301}".into();
        assert_eq!(
            claim_hash(&composed).unwrap(),
            claim_hash(&decomposed).unwrap()
        );
    }

    #[test]
    fn test_claim_hash_sensitive_to_content() {
        let base = claim_hash(&sample_claim()).unwrap();
        let mut other = sample_claim();
        other.extracted = "ETH to the sun".into();
        assert_ne!(claim_hash(&other).unwrap(), base);
    }

    #[test]
    fn test_claim_hash_rejects_wide_timestamp() {
        let mut claim = sample_claim();
        claim.timestamp = U256::from(u64::MAX) + U256::from(1u8);
        assert!(matches!(
            claim_hash(&claim),
            Err(ProtocolError::OutOfRange { bits: 64, .. })
        ));
    }

    #[test]
    fn test_claim_address_case_does_not_matter() {
        let lower: ClaimPayload = serde_json::from_value(serde_json::json!({
            "schemaId": "s", "sourceType": "t", "sourceRef": "r", "selector": "x",
            "extracted": "e", "extractedType": "string", "timestamp": 1,
            "responseHash": format!("0x{}", "ab".repeat(32)),
            "evidenceType": "url", "evidenceURI": "u",
            "crawler": "0x00000000000000000000000000000000000000ab",
        }))
        .unwrap();
        let mut upper = lower.clone();
        upper.crawler = "0x00000000000000000000000000000000000000AB".parse().unwrap();
        assert_eq!(claim_hash(&lower).unwrap(), claim_hash(&upper).unwrap());
    }

    #[test]
    fn test_intent_hash_action_normalization() {
        let base = intent_hash(&sample_intent()).unwrap();
        let mut lower = sample_intent();
        lower.action = " buy ".into();
        assert_eq!(intent_hash(&lower).unwrap(), base);

        let mut sell = sample_intent();
        sell.action = "SELL".into();
        assert_ne!(intent_hash(&sell).unwrap(), base);

        let mut bad = sample_intent();
        bad.action = "SHORT".into();
        assert!(matches!(
            intent_hash(&bad),
            Err(ProtocolError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_intent_hash_range_checks() {
        let mut intent = sample_intent();
        intent.max_slippage_bps = U256::from(70_000u64);
        assert!(intent_hash(&intent).is_err());

        let mut intent = sample_intent();
        intent.deadline = U256::MAX;
        assert!(intent_hash(&intent).is_err());
    }

    #[test]
    fn test_snapshot_hash_requires_strict_order() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0x02);
        assert!(snapshot_hash(7, &[a, b]).is_ok());
        assert!(snapshot_hash(7, &[b, a]).is_err());
        assert!(snapshot_hash(7, &[a, a, b]).is_err());
    }

    #[test]
    fn test_snapshot_hash_from_unordered_matches_canonical() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0x02);
        let c = B256::repeat_byte(0x03);
        let canonical = snapshot_hash(9, &[a, b, c]).unwrap();

        for permutation in [
            vec![c, b, a],
            vec![b, a, c, a],
            vec![a, c, b, c, b],
        ] {
            assert_eq!(snapshot_hash_from_unordered(9, &permutation).unwrap(), canonical);
        }
        assert_ne!(snapshot_hash_from_unordered(10, &[a, b, c]).unwrap(), canonical);
    }

    #[test]
    fn test_route_allowlist_hash_prefers_explicit_hash() {
        let data = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let mut route = ExecutionRoute {
            token_in: Address::repeat_byte(0xb1),
            token_out: Address::repeat_byte(0xc1),
            quote_amount_out: U256::from(1_000u64),
            min_amount_out: U256::from(990u64),
            adapter: Address::repeat_byte(0xad),
            adapter_data: Some(data.clone()),
            adapter_data_hash: None,
        };

        let from_data = route_allowlist_hash(&route).unwrap();
        let direct = intent_execution_call_hash(
            route.token_in,
            route.token_out,
            route.quote_amount_out,
            route.min_amount_out,
            route.adapter,
            &data,
        );
        assert_eq!(from_data, direct);

        route.adapter_data_hash = Some(keccak256(&data));
        assert_eq!(route_allowlist_hash(&route).unwrap(), from_data);

        route.adapter_data = None;
        route.adapter_data_hash = None;
        assert!(route_allowlist_hash(&route).is_err());
    }

    #[test]
    fn test_reason_hash_normalizes() {
        assert_eq!(reason_hash("  rebalance "), reason_hash("rebalance"));
        assert_eq!(reason_hash("rebalance"), keccak256(b"rebalance"));
    }

    #[test]
    fn test_scope_helpers() {
        let scope = ProtocolScope::new("fund-1", "room-a", 3);
        let padded = ProtocolScope::new(" fund-1 ", "room-a\n", 3);
        assert_eq!(scope_key(&scope), scope_key(&padded));
        assert!(assert_same_scope(&scope, &padded).is_ok());

        let other_epoch = ProtocolScope::new("fund-1", "room-a", 4);
        assert!(matches!(
            assert_same_scope(&scope, &other_epoch),
            Err(ProtocolError::ScopeMismatch { .. })
        ));

        let snap = B256::repeat_byte(0x77);
        assert_eq!(
            scoped_snapshot_hash(&scope, snap),
            scoped_snapshot_hash(&padded, snap)
        );
        assert_ne!(
            scoped_snapshot_hash(&scope, snap),
            scoped_snapshot_hash(&other_epoch, snap)
        );
    }
}
