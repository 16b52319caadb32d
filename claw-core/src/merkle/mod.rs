//! Merkle Commitments
//!
//! Epoch state commitment over approved claim hashes:
//! - leaves are strictly sorted ascending bytes32 values
//! - pairs hash commutatively, `keccak256(abi.encode(lo, hi))`
//! - an odd node at the end of a layer is paired with itself
//!
//! The root is the one the on-chain snapshot book recomputes from proofs.

use alloy_primitives::keccak256;
use alloy_sol_types::SolValue;

use crate::canon::{assert_strictly_sorted, unique_sorted};
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::B256;

/// Hash two nodes, smaller first
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    keccak256((lo, hi).abi_encode_params())
}

fn next_layer(layer: &[B256]) -> Vec<B256> {
    layer
        .chunks(2)
        .map(|chunk| {
            let left = chunk[0];
            let right = chunk.get(1).copied().unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// Merkle root of strictly sorted, non-empty leaves
pub fn merkle_root(ordered_leaves: &[B256]) -> ProtocolResult<B256> {
    if ordered_leaves.is_empty() {
        return Err(ProtocolError::EmptyLeaves);
    }
    assert_strictly_sorted(ordered_leaves, "orderedLeaves")?;

    let mut layer = ordered_leaves.to_vec();
    while layer.len() > 1 {
        layer = next_layer(&layer);
    }
    Ok(layer[0])
}

pub fn merkle_root_from_unordered(leaves: &[B256]) -> ProtocolResult<B256> {
    merkle_root(&unique_sorted(leaves))
}

/// Sibling path from `leaf` up to the root
pub fn merkle_proof(ordered_leaves: &[B256], leaf: B256) -> ProtocolResult<Vec<B256>> {
    if ordered_leaves.is_empty() {
        return Err(ProtocolError::EmptyLeaves);
    }
    assert_strictly_sorted(ordered_leaves, "orderedLeaves")?;

    let mut index = ordered_leaves
        .iter()
        .position(|candidate| *candidate == leaf)
        .ok_or_else(|| ProtocolError::LeafNotFound(leaf.to_string()))?;

    let mut proof = Vec::new();
    let mut layer = ordered_leaves.to_vec();
    while layer.len() > 1 {
        let sibling = layer.get(index ^ 1).copied().unwrap_or(layer[index]);
        proof.push(sibling);
        layer = next_layer(&layer);
        index /= 2;
    }
    Ok(proof)
}

/// Fold a proof back into a root and compare
pub fn verify_merkle_proof(root: B256, leaf: B256, proof: &[B256]) -> bool {
    proof
        .iter()
        .fold(leaf, |node, sibling| hash_pair(node, *sibling))
        == root
}

/// Epoch state hash over `(uint64 epochId, bytes32 merkleRoot)`
pub fn epoch_state_hash(epoch_id: u64, ordered_claim_hashes: &[B256]) -> ProtocolResult<B256> {
    let root = merkle_root(ordered_claim_hashes)?;
    Ok(keccak256((epoch_id, root).abi_encode_params()))
}

pub fn epoch_state_hash_from_unordered(epoch_id: u64, claim_hashes: &[B256]) -> ProtocolResult<B256> {
    epoch_state_hash(epoch_id, &unique_sorted(claim_hashes))
}
