//! Basic Types
//!
//! Naming conventions:
//! - `_hash` suffix: keccak-256 commitments (`B256`)
//! - `_id` suffix: identifiers chosen by callers (fund, bot, job)

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use alloy_primitives::{Address, Bytes, B256, U256};

/// Kind of subject an attestation speaks about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubjectType {
    Claim,
    Intent,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Claim => "CLAIM",
            SubjectType::Intent => "INTENT",
        }
    }

    /// Lowercase label used in metrics and event names
    pub fn label(&self) -> &'static str {
        match self {
            SubjectType::Claim => "claim",
            SubjectType::Intent => "intent",
        }
    }
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLAIM" => Ok(SubjectType::Claim),
            "INTENT" => Ok(SubjectType::Intent),
            other => Err(ProtocolError::invalid(format!("unknown subject type: {other}"))),
        }
    }
}

/// Parse a 20-byte hex address in any letter case
pub fn parse_address(field: &str, value: &str) -> ProtocolResult<Address> {
    Address::from_str(value.trim()).map_err(|_| ProtocolError::InvalidAddress {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a `0x`-prefixed 32-byte hex value in any letter case
pub fn parse_bytes32(field: &str, value: &str) -> ProtocolResult<B256> {
    let trimmed = value.trim();
    let invalid = || ProtocolError::InvalidBytes32 {
        field: field.to_string(),
    };
    let digits = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 64 {
        return Err(invalid());
    }
    B256::from_str(digits).map_err(|_| invalid())
}

/// Serde adapter for `U256` that accepts JSON numbers, decimal strings and
/// `0x` hex strings, and always writes a decimal string.
pub mod serde_u256 {
    use super::U256;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(U256::from(n)),
            Raw::Text(s) => U256::from_str(s.trim())
                .map_err(|e| D::Error::custom(format!("invalid unsigned integer {s:?}: {e}"))),
        }
    }
}

/// Serde adapter for `u64` that also accepts decimal strings, for values
/// bots serialize from bigints.
pub mod serde_u64 {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| D::Error::custom(format!("invalid uint64 {s:?}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_u256")]
        value: U256,
    }

    #[test]
    fn test_parse_address_any_case() {
        let lower = parse_address("a", "0x00000000000000000000000000000000000000aa").unwrap();
        let upper = parse_address("a", "0x00000000000000000000000000000000000000AA").unwrap();
        assert_eq!(lower, upper);
        assert!(parse_address("a", "0x1234").is_err());
    }

    #[test]
    fn test_parse_bytes32() {
        let hex = format!("0x{}", "ab".repeat(32));
        assert!(parse_bytes32("h", &hex).is_ok());
        assert!(parse_bytes32("h", &"ab".repeat(32)).is_err());
        assert!(parse_bytes32("h", "0x1234").is_err());
    }

    #[test]
    fn test_serde_u256_accepts_numbers_and_strings() {
        let a: Wrapper = serde_json::from_str(r#"{"value": 42}"#).unwrap();
        let b: Wrapper = serde_json::from_str(r#"{"value": "42"}"#).unwrap();
        let c: Wrapper = serde_json::from_str(r#"{"value": "0x2a"}"#).unwrap();
        assert_eq!(a.value, U256::from(42u64));
        assert_eq!(a.value, b.value);
        assert_eq!(b.value, c.value);

        assert!(serde_json::from_str::<Wrapper>(r#"{"value": -1}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": "-1"}"#).is_err());

        let out = serde_json::to_string(&a).unwrap();
        assert_eq!(out, r#"{"value":"42"}"#);
    }

    #[test]
    fn test_serde_u64_accepts_strings() {
        #[derive(Deserialize)]
        struct W {
            #[serde(with = "serde_u64")]
            v: u64,
        }
        let a: W = serde_json::from_str(r#"{"v": "18446744073709551615"}"#).unwrap();
        assert_eq!(a.v, u64::MAX);
        assert!(serde_json::from_str::<W>(r#"{"v": "18446744073709551616"}"#).is_err());
    }

    #[test]
    fn test_subject_type_roundtrip() {
        assert_eq!("claim".parse::<SubjectType>().unwrap(), SubjectType::Claim);
        assert_eq!(
            serde_json::to_string(&SubjectType::Intent).unwrap(),
            "\"INTENT\""
        );
        assert!("vote".parse::<SubjectType>().is_err());
    }
}
