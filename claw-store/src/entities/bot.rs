//! Bot, fund and membership entities

use chrono::{DateTime, Utc};
use claw_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Role a bot is registered with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotRole {
    /// Proposes intents and manages the fund's bots
    Strategy,
    /// Submits and attests claims, attests intents
    Participant,
}

impl BotRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotRole::Strategy => "strategy",
            BotRole::Participant => "participant",
        }
    }
}

impl std::fmt::Display for BotRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strategy" => Ok(BotRole::Strategy),
            "participant" => Ok(BotRole::Participant),
            other => Err(format!("unknown bot role: {other}")),
        }
    }
}

/// Registered bot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotEntity {
    pub bot_id: String,
    /// Address bot requests must recover to
    pub address: Address,
    pub roles: BTreeSet<BotRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fund created through bootstrap
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundEntity {
    pub fund_id: String,
    pub strategy_bot_id: String,
    pub created_at: DateTime<Utc>,
}

/// Membership status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Disabled,
}

/// Bot membership in one fund
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundBotMembership {
    pub fund_id: String,
    pub bot_id: String,
    pub role: BotRole,
    pub address: Address,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

impl FundBotMembership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("Strategy".parse::<BotRole>().unwrap(), BotRole::Strategy);
        assert_eq!(" participant ".parse::<BotRole>().unwrap(), BotRole::Participant);
        assert!("verifier".parse::<BotRole>().is_err());
    }
}
