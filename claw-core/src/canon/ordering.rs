//! Ordering rules for bytes32 lists
//!
//! Byte order on `B256` equals lexical order of the lowercase hex form.

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::B256;

/// Fail unless every element is strictly greater than the previous one
pub fn assert_strictly_sorted(values: &[B256], label: &str) -> ProtocolResult<()> {
    if values.windows(2).all(|pair| pair[0] < pair[1]) {
        Ok(())
    } else {
        Err(ProtocolError::not_sorted(label))
    }
}

/// Sort ascending and drop duplicates
pub fn unique_sorted(values: &[B256]) -> Vec<B256> {
    let mut out = values.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
