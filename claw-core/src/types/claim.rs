//! Claim payloads
//!
//! A claim asserts an extracted fact about an external source. Its identity is
//! the keccak-256 of the canonical ABI tuple, see [`crate::hash::claim_hash`].

use super::common::{serde_u256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Claim payload as submitted by a participant bot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPayload {
    pub schema_id: String,
    pub source_type: String,
    pub source_ref: String,
    pub selector: String,
    pub extracted: String,
    pub extracted_type: String,
    /// Observation time, unix seconds. Must fit uint64.
    #[serde(with = "serde_u256")]
    pub timestamp: U256,
    pub response_hash: B256,
    pub evidence_type: String,
    #[serde(rename = "evidenceURI", alias = "evidenceUri")]
    pub evidence_uri: String,
    pub crawler: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Claim after text normalization and range checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalClaim {
    pub schema_id: String,
    pub source_type: String,
    pub source_ref: String,
    pub selector: String,
    pub extracted: String,
    pub extracted_type: String,
    pub timestamp: u64,
    pub response_hash: B256,
    pub evidence_type: String,
    pub evidence_uri: String,
    pub crawler: Address,
    /// Missing notes canonicalize to the empty string
    pub notes: String,
}
