//! Protocol Type Definitions
//!
//! Wire types use camelCase field names so bots and the relayer exchange the
//! same JSON. Canonical forms (see [`crate::canon`]) are what get hashed.

pub mod claim;
pub mod common;
pub mod intent;
pub mod scope;

pub use claim::{CanonicalClaim, ClaimPayload};
pub use common::{
    parse_address, parse_bytes32, serde_u256, serde_u64, Address, Bytes, SubjectType, B256, U256,
};
pub use intent::{CanonicalIntent, ExecutionRoute, TradeAction, TradeIntent};
pub use scope::ProtocolScope;
