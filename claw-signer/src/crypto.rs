//! Attestation Typed Data (EIP-712)
//!
//! Digests are bound to a chain id and a verifying contract, so a signature
//! is only valid for one deployment of the claim or intent book.
//!
//! The relayer never signs attestations; it only recomputes digests and
//! recovers signers.

use alloy_primitives::{Address, Signature, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use claw_core::types::{serde_u256, serde_u64};
use claw_core::SubjectType;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::{SignerError, SignerResult};

/// Domain names and version of the on-chain books
pub mod domain {
    pub const CLAIM_BOOK: &str = "ClawClaimBook";
    pub const INTENT_BOOK: &str = "ClawIntentBook";
    pub const VERSION: &str = "1";
}

mod typed {
    alloy_sol_types::sol! {
        struct ClaimAttestation {
            bytes32 claimHash;
            uint64 epochId;
            address verifier;
            uint64 expiresAt;
            uint256 nonce;
        }

        struct IntentAttestation {
            bytes32 intentHash;
            address verifier;
            uint64 expiresAt;
            uint256 nonce;
        }
    }
}

/// EIP-712 domain of one book deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl AttestationDomain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// Domain of the claim book at `verifying_contract`
    pub fn claim_book(chain_id: u64, verifying_contract: Address) -> Self {
        Self::new(domain::CLAIM_BOOK, domain::VERSION, chain_id, verifying_contract)
    }

    /// Domain of the intent book at `verifying_contract`
    pub fn intent_book(chain_id: u64, verifying_contract: Address) -> Self {
        Self::new(domain::INTENT_BOOK, domain::VERSION, chain_id, verifying_contract)
    }

    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.name.clone())),
            Some(Cow::Owned(self.version.clone())),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

/// Message signed by a verifier bot
pub trait AttestationMessage {
    /// Kind of subject the message attests
    const SUBJECT: SubjectType;

    fn subject_hash(&self) -> B256;
    fn verifier(&self) -> Address;
    fn expires_at(&self) -> u64;
    fn nonce(&self) -> U256;

    /// EIP-712 signing hash under `domain`
    fn signing_hash(&self, domain: &Eip712Domain) -> B256;
}

/// `ClaimAttestation(bytes32 claimHash,uint64 epochId,address verifier,uint64 expiresAt,uint256 nonce)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimAttestationMessage {
    pub claim_hash: B256,
    #[serde(with = "serde_u64")]
    pub epoch_id: u64,
    pub verifier: Address,
    #[serde(with = "serde_u64")]
    pub expires_at: u64,
    #[serde(with = "serde_u256")]
    pub nonce: U256,
}

impl AttestationMessage for ClaimAttestationMessage {
    const SUBJECT: SubjectType = SubjectType::Claim;

    fn subject_hash(&self) -> B256 {
        self.claim_hash
    }

    fn verifier(&self) -> Address {
        self.verifier
    }

    fn expires_at(&self) -> u64 {
        self.expires_at
    }

    fn nonce(&self) -> U256 {
        self.nonce
    }

    fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        typed::ClaimAttestation {
            claimHash: self.claim_hash,
            epochId: self.epoch_id,
            verifier: self.verifier,
            expiresAt: self.expires_at,
            nonce: self.nonce,
        }
        .eip712_signing_hash(domain)
    }
}

/// `IntentAttestation(bytes32 intentHash,address verifier,uint64 expiresAt,uint256 nonce)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentAttestationMessage {
    pub intent_hash: B256,
    pub verifier: Address,
    #[serde(with = "serde_u64")]
    pub expires_at: u64,
    #[serde(with = "serde_u256")]
    pub nonce: U256,
}

impl AttestationMessage for IntentAttestationMessage {
    const SUBJECT: SubjectType = SubjectType::Intent;

    fn subject_hash(&self) -> B256 {
        self.intent_hash
    }

    fn verifier(&self) -> Address {
        self.verifier
    }

    fn expires_at(&self) -> u64 {
        self.expires_at
    }

    fn nonce(&self) -> U256 {
        self.nonce
    }

    fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        typed::IntentAttestation {
            intentHash: self.intent_hash,
            verifier: self.verifier,
            expiresAt: self.expires_at,
            nonce: self.nonce,
        }
        .eip712_signing_hash(domain)
    }
}

/// Typed-data digest of `message` under `domain`
pub fn digest<M: AttestationMessage>(domain: &AttestationDomain, message: &M) -> B256 {
    message.signing_hash(&domain.to_eip712())
}

/// Parse a 65-byte `r || s || v` signature from hex
pub fn parse_signature(signature: &str) -> SignerResult<Signature> {
    let trimmed = signature.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits)
        .map_err(|e| SignerError::InvalidSignature(format!("not hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(SignerError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }
    Signature::from_raw(&bytes).map_err(|e| SignerError::InvalidSignature(e.to_string()))
}

/// Recover the address that signed `message` under `domain`
pub fn recover_signer<M: AttestationMessage>(
    domain: &AttestationDomain,
    message: &M,
    signature: &str,
) -> SignerResult<Address> {
    let signature = parse_signature(signature)?;
    let hash = digest(domain, message);
    signature
        .recover_address_from_prehash(&hash)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))
}

/// True iff the signature recovers to `message.verifier()`
pub fn verify<M: AttestationMessage>(
    domain: &AttestationDomain,
    message: &M,
    signature: &str,
) -> bool {
    matches!(recover_signer(domain, message, signature), Ok(signer) if signer == message.verifier())
}
