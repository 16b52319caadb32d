//! Protocol scope

use serde::{Deserialize, Serialize};

/// Logical context an attestation belongs to.
///
/// Two scopes are equal iff their canonical triples are equal; compare with
/// [`crate::hash::scope_key`] rather than field-by-field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolScope {
    pub fund_id: String,
    pub room_id: String,
    pub epoch_id: u64,
}

impl ProtocolScope {
    pub fn new(fund_id: impl Into<String>, room_id: impl Into<String>, epoch_id: u64) -> Self {
        Self {
            fund_id: fund_id.into(),
            room_id: room_id.into(),
            epoch_id,
        }
    }
}
