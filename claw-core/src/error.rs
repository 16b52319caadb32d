//! Protocol Error Codes
//!
//! Error code format: CLAW-{module}-{sequence}
//! - CLAW-CANON: Canonicalization and range checks
//! - CLAW-ORDER: Ordering of hash lists
//! - CLAW-MERKLE: Merkle commitments
//! - CLAW-SCOPE: Protocol scope checks
//! - CLAW-REPLAY: Expiry and nonce checks

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol result type
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Error taxonomy shared by every relayer crate.
///
/// Each crate error maps onto exactly one kind; the HTTP layer derives its
/// status code from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or out-of-range input. Never retried.
    Validation,
    /// Missing or invalid credentials, unregistered bot, insufficient scope
    Auth,
    /// Nonce reuse, expired attestation, non-increasing nonce
    Replay,
    /// State transition from the wrong state, duplicate registration
    Conflict,
    /// Unknown entity
    NotFound,
    /// Storage or RPC failure, eligible for retry
    Transient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Auth => "AUTH",
            ErrorKind::Replay => "REPLAY",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Transient => "TRANSIENT",
        }
    }

    /// Whether an operation failing with this kind may be retried as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // ============================================================
    // Canonicalization Errors (CLAW-CANON-*)
    // ============================================================
    /// [CLAW-CANON-001] Integer does not fit the ABI width
    #[error("[CLAW-CANON-001] {field} must be uint{bits}")]
    OutOfRange { field: String, bits: u16 },

    /// [CLAW-CANON-002] Trade action outside BUY/SELL
    #[error("[CLAW-CANON-002] invalid action: {0}")]
    InvalidAction(String),

    /// [CLAW-CANON-003] Malformed address
    #[error("[CLAW-CANON-003] invalid address for {field}: {value}")]
    InvalidAddress { field: String, value: String },

    /// [CLAW-CANON-004] Malformed 32-byte hex value
    #[error("[CLAW-CANON-004] {field} must be 0x-prefixed 32-byte hex")]
    InvalidBytes32 { field: String },

    /// [CLAW-CANON-005] Value must be strictly positive
    #[error("[CLAW-CANON-005] {field} must be positive")]
    NotPositive { field: String },

    /// [CLAW-CANON-006] Generic field validation failure
    #[error("[CLAW-CANON-006] {0}")]
    Invalid(String),

    // ============================================================
    // Ordering Errors (CLAW-ORDER-*)
    // ============================================================
    /// [CLAW-ORDER-001] Hash list not strictly ascending
    #[error("[CLAW-ORDER-001] {label} must be strictly sorted ascending with no duplicates")]
    NotStrictlySorted { label: String },

    // ============================================================
    // Merkle Errors (CLAW-MERKLE-*)
    // ============================================================
    /// [CLAW-MERKLE-001] Empty leaf set
    #[error("[CLAW-MERKLE-001] leaves must not be empty")]
    EmptyLeaves,

    /// [CLAW-MERKLE-002] Leaf absent from the ordered set
    #[error("[CLAW-MERKLE-002] leaf {0} not found in ordered leaves")]
    LeafNotFound(String),

    // ============================================================
    // Scope Errors (CLAW-SCOPE-*)
    // ============================================================
    /// [CLAW-SCOPE-001] Scope keys differ
    #[error("[CLAW-SCOPE-001] scope mismatch: expected={expected}, received={received}")]
    ScopeMismatch { expected: String, received: String },

    // ============================================================
    // Replay Errors (CLAW-REPLAY-*)
    // ============================================================
    /// [CLAW-REPLAY-001] Attestation expired
    #[error("[CLAW-REPLAY-001] attestation expired: expiresAt={expires_at}, now={now}")]
    Expired { expires_at: u64, now: u64 },

    /// [CLAW-REPLAY-002] Nonce did not increase
    #[error("[CLAW-REPLAY-002] nonce must strictly increase: last={last}, incoming={incoming}")]
    NonceNotIncreasing { last: String, incoming: String },

    /// [CLAW-REPLAY-003] Request timestamp outside the accepted window
    #[error("[CLAW-REPLAY-003] timestamp {timestamp} outside {window_secs}s window of {now}")]
    TimestampSkew {
        timestamp: i64,
        now: i64,
        window_secs: i64,
    },
}

impl ProtocolError {
    /// Create a generic validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Create an out-of-range error
    pub fn out_of_range(field: impl Into<String>, bits: u16) -> Self {
        Self::OutOfRange {
            field: field.into(),
            bits,
        }
    }

    /// Create a not-positive error
    pub fn not_positive(field: impl Into<String>) -> Self {
        Self::NotPositive {
            field: field.into(),
        }
    }

    /// Create a not-strictly-sorted error
    pub fn not_sorted(label: impl Into<String>) -> Self {
        Self::NotStrictlySorted {
            label: label.into(),
        }
    }

    /// Error kind in the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Expired { .. }
            | ProtocolError::NonceNotIncreasing { .. }
            | ProtocolError::TimestampSkew { .. } => ErrorKind::Replay,
            ProtocolError::LeafNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_message() {
        let err = ProtocolError::out_of_range("timestamp", 64);
        assert!(err.to_string().starts_with("[CLAW-CANON-001]"));

        let err = ProtocolError::not_sorted("orderedClaimHashes");
        assert!(err.to_string().contains("strictly sorted"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ProtocolError::invalid("x").kind(), ErrorKind::Validation);
        assert_eq!(
            ProtocolError::Expired { expires_at: 1, now: 1 }.kind(),
            ErrorKind::Replay
        );
        assert_eq!(
            ProtocolError::LeafNotFound("0x00".into()).kind(),
            ErrorKind::NotFound
        );
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
    }

    #[test]
    fn test_kind_serializes_screaming() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }
}
