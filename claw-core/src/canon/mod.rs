//! Canonicalization
//!
//! Everything that is hashed goes through here first. Text is Unicode NFC
//! normalized then trimmed, integers are range checked against their ABI
//! width, and addresses are held as bytes so letter case never matters.

mod ordering;

pub use ordering::{assert_strictly_sorted, unique_sorted};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{CanonicalClaim, CanonicalIntent, ClaimPayload, TradeAction, TradeIntent, U256};
use unicode_normalization::UnicodeNormalization;

/// NFC-normalize then trim surrounding whitespace
pub fn normalize_text(value: &str) -> String {
    value.nfc().collect::<String>().trim().to_string()
}

/// Narrow to uint64 or fail with the field name
pub fn assert_uint64(value: U256, field: &str) -> ProtocolResult<u64> {
    u64::try_from(value).map_err(|_| ProtocolError::out_of_range(field, 64))
}

/// Narrow to uint16 or fail with the field name
pub fn assert_uint16(value: U256, field: &str) -> ProtocolResult<u16> {
    u16::try_from(value).map_err(|_| ProtocolError::out_of_range(field, 16))
}

pub fn assert_positive(value: U256, field: &str) -> ProtocolResult<()> {
    if value.is_zero() {
        return Err(ProtocolError::not_positive(field));
    }
    Ok(())
}

/// Canonical claim: normalized text, uint64 timestamp, notes defaulted
pub fn canonical_claim(payload: &ClaimPayload) -> ProtocolResult<CanonicalClaim> {
    Ok(CanonicalClaim {
        schema_id: normalize_text(&payload.schema_id),
        source_type: normalize_text(&payload.source_type),
        source_ref: normalize_text(&payload.source_ref),
        selector: normalize_text(&payload.selector),
        extracted: normalize_text(&payload.extracted),
        extracted_type: normalize_text(&payload.extracted_type),
        timestamp: assert_uint64(payload.timestamp, "timestamp")?,
        response_hash: payload.response_hash,
        evidence_type: normalize_text(&payload.evidence_type),
        evidence_uri: normalize_text(&payload.evidence_uri),
        crawler: payload.crawler,
        notes: payload
            .notes
            .as_deref()
            .map(normalize_text)
            .unwrap_or_default(),
    })
}

/// Canonical intent: BUY/SELL action, uint64 deadline, uint16 slippage
pub fn canonical_intent(intent: &TradeIntent) -> ProtocolResult<CanonicalIntent> {
    let action: TradeAction = intent.action.parse()?;
    Ok(CanonicalIntent {
        intent_version: normalize_text(&intent.intent_version),
        vault: intent.vault,
        action,
        token_in: intent.token_in,
        token_out: intent.token_out,
        amount_in: intent.amount_in,
        min_amount_out: intent.min_amount_out,
        deadline: assert_uint64(intent.deadline, "deadline")?,
        max_slippage_bps: assert_uint16(intent.max_slippage_bps, "maxSlippageBps")?,
        snapshot_hash: intent.snapshot_hash,
    })
}

/// Full admission check for a newly proposed intent.
///
/// On top of the canonical form this requires positive amounts and a deadline
/// strictly after `now` (unix seconds).
pub fn validate_intent(intent: &TradeIntent, now: u64) -> ProtocolResult<CanonicalIntent> {
    let canonical = canonical_intent(intent)?;
    assert_positive(canonical.amount_in, "amountIn")?;
    assert_positive(canonical.min_amount_out, "minAmountOut")?;
    if canonical.deadline <= now {
        return Err(ProtocolError::invalid("intent deadline is expired"));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, B256};

    fn sample_intent() -> TradeIntent {
        TradeIntent {
            intent_version: "v1".into(),
            vault: Address::repeat_byte(0xa1),
            action: "buy".into(),
            token_in: Address::repeat_byte(0xb1),
            token_out: Address::repeat_byte(0xc1),
            amount_in: U256::from(1_000u64),
            min_amount_out: U256::from(900u64),
            deadline: U256::from(2_000u64),
            max_slippage_bps: U256::from(50u64),
            snapshot_hash: B256::repeat_byte(0x11),
            reason: None,
        }
    }

    #[test]
    fn test_normalize_text_nfc_and_trim() {
        // "e" followed by a combining acute accent composes to U+00E9
        assert_eq!(normalize_text("  caf\u{0065}\u{0301} \n"), "caf\u{00e9}");
        assert_eq!(normalize_text("\tplain"), "plain");
    }

    #[test]
    fn test_uint_bounds() {
        assert_eq!(assert_uint64(U256::from(u64::MAX), "t").unwrap(), u64::MAX);
        assert!(assert_uint64(U256::from(u64::MAX) + U256::from(1u8), "t").is_err());
        assert_eq!(assert_uint16(U256::from(65_535u32), "s").unwrap(), 65_535);
        assert!(matches!(
            assert_uint16(U256::from(65_536u32), "s"),
            Err(ProtocolError::OutOfRange { bits: 16, .. })
        ));
    }

    #[test]
    fn test_canonical_intent_uppercases_action() {
        let canonical = canonical_intent(&sample_intent()).unwrap();
        assert_eq!(canonical.action, TradeAction::Buy);
        assert_eq!(canonical.deadline, 2_000);
    }

    #[test]
    fn test_validate_intent_rules() {
        assert!(validate_intent(&sample_intent(), 1_999).is_ok());
        assert!(validate_intent(&sample_intent(), 2_000).is_err());

        let mut zero = sample_intent();
        zero.amount_in = U256::ZERO;
        assert!(matches!(
            validate_intent(&zero, 0),
            Err(ProtocolError::NotPositive { .. })
        ));
    }
}
