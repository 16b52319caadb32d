//! Trade intents and execution routes

use super::common::{serde_u256, Address, Bytes, B256, U256};
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trade direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

impl FromStr for TradeAction {
    type Err = ProtocolError;

    /// Accepts any letter case and surrounding whitespace
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match crate::canon::normalize_text(raw).to_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            _ => Err(ProtocolError::InvalidAction(raw.to_string())),
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade intent as proposed by a strategy bot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeIntent {
    pub intent_version: String,
    pub vault: Address,
    /// Raw action text; normalized to BUY/SELL before hashing
    pub action: String,
    pub token_in: Address,
    pub token_out: Address,
    #[serde(with = "serde_u256")]
    pub amount_in: U256,
    #[serde(with = "serde_u256")]
    pub min_amount_out: U256,
    /// Unix seconds. Must fit uint64.
    #[serde(with = "serde_u256")]
    pub deadline: U256,
    /// Must fit uint16
    #[serde(with = "serde_u256")]
    pub max_slippage_bps: U256,
    pub snapshot_hash: B256,
    /// Free-text rationale, not part of the hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Intent after normalization and range checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalIntent {
    pub intent_version: String,
    pub vault: Address,
    pub action: TradeAction,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub deadline: u64,
    pub max_slippage_bps: u16,
    pub snapshot_hash: B256,
}

/// Execution route bound to an intent through the allowlist hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRoute {
    pub token_in: Address,
    pub token_out: Address,
    #[serde(with = "serde_u256")]
    pub quote_amount_out: U256,
    #[serde(with = "serde_u256")]
    pub min_amount_out: U256,
    pub adapter: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_data_hash: Option<B256>,
}

impl ExecutionRoute {
    /// Check that the route trades the intent's pair with the same floor
    pub fn ensure_matches(&self, intent: &CanonicalIntent) -> ProtocolResult<()> {
        if self.token_in != intent.token_in {
            return Err(ProtocolError::invalid(
                "executionRoute.tokenIn must match intent.tokenIn",
            ));
        }
        if self.token_out != intent.token_out {
            return Err(ProtocolError::invalid(
                "executionRoute.tokenOut must match intent.tokenOut",
            ));
        }
        if self.min_amount_out != intent.min_amount_out {
            return Err(ProtocolError::invalid(
                "executionRoute.minAmountOut must match intent.minAmountOut",
            ));
        }
        Ok(())
    }
}
