//! Claw Signer - Attestation Signatures and Weighted Quorum
//!
//! Attestation Codec:
//! - EIP-712 domains bound to chain id and book contract
//! - Claim and intent attestation digests
//! - Signer recovery and structured envelope verification
//!
//! Bot Requests:
//! - EIP-191 signed `openfunderse:auth:{botId}:{timestamp}:{nonce}`
//!
//! Weighted Quorum:
//! - Validated weight maps (no negatives, no duplicates)
//! - De-duplicated attested weight
//! - Inclusive threshold checks and load-time snapshot validation

pub mod bot_message;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod validator_set;

pub use bot_message::*;
pub use crypto::{
    digest, parse_signature, recover_signer, verify, AttestationDomain, AttestationMessage,
    ClaimAttestationMessage, IntentAttestationMessage,
};
pub use error::*;
pub use integrity::*;
pub use validator_set::*;
