//! Attestation Envelope Verification
//!
//! Composes the expiry check, signer recovery and the verifier address match
//! into one structured result. Malformed signatures end up as a rejection
//! value, so a batch can keep going after one bad item.

use alloy_primitives::{Address, B256};
use claw_core::replay::is_expired;
use serde::{Deserialize, Serialize};

use crate::crypto::{digest, recover_signer, AttestationDomain, AttestationMessage};

/// Why an envelope was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeFailure {
    /// `expiresAt <= now`
    Expired,
    /// Signature bytes malformed or not recoverable
    RecoveryFailed,
    /// Recovered signer differs from the claimed verifier
    AddressMismatch,
}

impl EnvelopeFailure {
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeFailure::Expired => "EXPIRED",
            EnvelopeFailure::RecoveryFailed => "RECOVERY_FAILED",
            EnvelopeFailure::AddressMismatch => "ADDRESS_MISMATCH",
        }
    }
}

impl std::fmt::Display for EnvelopeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of [`verify_envelope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeVerification {
    Verified {
        recovered: Address,
        digest: B256,
    },
    Rejected {
        reason: EnvelopeFailure,
        digest: B256,
        detail: String,
    },
}

impl EnvelopeVerification {
    pub fn is_verified(&self) -> bool {
        matches!(self, EnvelopeVerification::Verified { .. })
    }

    pub fn digest(&self) -> B256 {
        match self {
            EnvelopeVerification::Verified { digest, .. }
            | EnvelopeVerification::Rejected { digest, .. } => *digest,
        }
    }

    pub fn failure(&self) -> Option<EnvelopeFailure> {
        match self {
            EnvelopeVerification::Verified { .. } => None,
            EnvelopeVerification::Rejected { reason, .. } => Some(*reason),
        }
    }

    /// Human readable summary for logs and API messages
    pub fn summary(&self) -> String {
        match self {
            EnvelopeVerification::Verified { recovered, .. } => {
                format!("verified signer {recovered}")
            }
            EnvelopeVerification::Rejected { reason, detail, .. } => {
                format!("{reason}: {detail}")
            }
        }
    }
}

/// Verify an attestation envelope against `now` (unix seconds).
///
/// Expiry is checked before any signature work.
pub fn verify_envelope<M: AttestationMessage>(
    domain: &AttestationDomain,
    message: &M,
    signature: &str,
    now: u64,
) -> EnvelopeVerification {
    let digest = digest(domain, message);

    if is_expired(message.expires_at(), now) {
        return EnvelopeVerification::Rejected {
            reason: EnvelopeFailure::Expired,
            digest,
            detail: format!(
                "attestation expired: expiresAt={}, now={}",
                message.expires_at(),
                now
            ),
        };
    }

    let recovered = match recover_signer(domain, message, signature) {
        Ok(address) => address,
        Err(e) => {
            tracing::debug!(error = %e, "attestation signature recovery failed");
            return EnvelopeVerification::Rejected {
                reason: EnvelopeFailure::RecoveryFailed,
                digest,
                detail: e.to_string(),
            };
        }
    };

    if recovered != message.verifier() {
        return EnvelopeVerification::Rejected {
            reason: EnvelopeFailure::AddressMismatch,
            digest,
            detail: format!(
                "recovered {recovered} does not match verifier {}",
                message.verifier()
            ),
        };
    }

    EnvelopeVerification::Verified { recovered, digest }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_support::{sign, signer};
    use crate::crypto::IntentAttestationMessage;
    use alloy_primitives::U256;

    const NOW: u64 = 1_700_000_000;

    fn domain() -> AttestationDomain {
        AttestationDomain::intent_book(10143, Address::repeat_byte(0x0a))
    }

    fn message(verifier: Address, expires_at: u64) -> IntentAttestationMessage {
        IntentAttestationMessage {
            intent_hash: B256::repeat_byte(0xe9),
            verifier,
            expires_at,
            nonce: U256::from(10u8),
        }
    }

    #[test]
    fn test_verified_envelope() {
        let key = signer(0x03);
        let msg = message(key.address(), NOW + 1);
        let sig = sign(&key, &domain(), &msg);

        let result = verify_envelope(&domain(), &msg, &sig, NOW);
        assert!(result.is_verified());
        assert_eq!(
            result,
            EnvelopeVerification::Verified {
                recovered: key.address(),
                digest: digest(&domain(), &msg),
            }
        );
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let key = signer(0x03);
        let msg = message(key.address(), NOW);
        let sig = sign(&key, &domain(), &msg);

        let result = verify_envelope(&domain(), &msg, &sig, NOW);
        assert_eq!(result.failure(), Some(EnvelopeFailure::Expired));
    }

    #[test]
    fn test_malformed_signature_yields_recovery_failed() {
        let msg = message(Address::repeat_byte(0x01), NOW + 60);
        let result = verify_envelope(&domain(), &msg, "0x1234", NOW);
        assert_eq!(result.failure(), Some(EnvelopeFailure::RecoveryFailed));
        assert!(result.summary().starts_with("RECOVERY_FAILED"));
    }

    #[test]
    fn test_other_signer_yields_address_mismatch() {
        let key = signer(0x03);
        let impostor = signer(0x04);
        let msg = message(key.address(), NOW + 60);
        let sig = sign(&impostor, &domain(), &msg);

        let result = verify_envelope(&domain(), &msg, &sig, NOW);
        assert_eq!(result.failure(), Some(EnvelopeFailure::AddressMismatch));
    }

    #[test]
    fn test_failure_serializes_as_code() {
        let json = serde_json::to_string(&EnvelopeFailure::AddressMismatch).unwrap();
        assert_eq!(json, "\"ADDRESS_MISMATCH\"");
    }
}
