//! Claw Core - Canonical Protocol Encoding
//!
//! Shared by the relayer, the bots and the on-chain books:
//! - **Canonicalization**: NFC + trim for text, range checks for integers
//! - **Protocol hashes**: claim, intent, snapshot, execution allowlist, scope
//! - **Merkle commitments**: epoch state root over approved claims
//! - **Replay checks**: expiry, strictly increasing nonces, request windows
//!
//! # Hash Layout
//!
//! | Hash | ABI parameters |
//! |------|----------------|
//! | claim | `string x6, uint64, bytes32, string x2, address, string` |
//! | intent | `string, address, string, address, address, uint256, uint256, uint64, uint16, bytes32` |
//! | snapshot | `uint64 epochId, bytes32[] orderedClaimHashes` |
//! | allowlist | `address, address, uint256, uint256, address, bytes32` |
//! | epoch state | `uint64 epochId, bytes32 merkleRoot` |
//!
//! All are `keccak256(abi.encode(...))`.

pub mod canon;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod replay;
pub mod types;

pub use error::{ErrorKind, ProtocolError, ProtocolResult};
pub use hash::{
    assert_same_scope, claim_hash, intent_execution_allowlist_hash, intent_execution_call_hash,
    intent_hash, reason_hash, route_allowlist_hash, scope_key, scoped_snapshot_hash,
    snapshot_hash, snapshot_hash_from_unordered,
};
pub use merkle::{
    epoch_state_hash, epoch_state_hash_from_unordered, merkle_proof, merkle_root,
    verify_merkle_proof,
};
pub use types::*;

/// Protocol version string
pub const PROTOCOL_VERSION: &str = "v1";
