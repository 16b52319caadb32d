//! Outbox events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Relayer event types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "epoch:opened")]
    EpochOpened,
    #[serde(rename = "claim:attested")]
    ClaimAttested,
    #[serde(rename = "snapshot:finalized")]
    SnapshotFinalized,
    #[serde(rename = "intent:proposed")]
    IntentProposed,
    #[serde(rename = "intent:attested")]
    IntentAttested,
    #[serde(rename = "intent:ready")]
    IntentReady,
    #[serde(rename = "intent:executed")]
    IntentExecuted,
    #[serde(rename = "intent:failed")]
    IntentFailed,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::EpochOpened,
        EventType::ClaimAttested,
        EventType::SnapshotFinalized,
        EventType::IntentProposed,
        EventType::IntentAttested,
        EventType::IntentReady,
        EventType::IntentExecuted,
        EventType::IntentFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EpochOpened => "epoch:opened",
            EventType::ClaimAttested => "claim:attested",
            EventType::SnapshotFinalized => "snapshot:finalized",
            EventType::IntentProposed => "intent:proposed",
            EventType::IntentAttested => "intent:attested",
            EventType::IntentReady => "intent:ready",
            EventType::IntentExecuted => "intent:executed",
            EventType::IntentFailed => "intent:failed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown event type: {wanted}"))
    }
}

/// Durable outbox row; `id` is assigned by the store and strictly increasing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxEventEntity {
    pub id: u64,
    pub event_type: EventType,
    pub fund_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Outbox row before the store assigns an id
#[derive(Clone, Debug, PartialEq)]
pub struct NewOutboxEvent {
    pub event_type: EventType,
    pub fund_id: String,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse_matches_wire_names() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
        assert!("intent:cancelled".parse::<EventType>().is_err());
    }
}
