//! Error types for Claw Signer

use claw_core::{ErrorKind, ProtocolError};
use thiserror::Error;

/// Signer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Negative weight for validator {validator}: {weight}")]
    NegativeWeight { validator: String, weight: i128 },

    #[error("Zero weight for validator {validator} is not allowed")]
    ZeroWeight { validator: String },

    #[error("Duplicate validator: {0}")]
    DuplicateValidator(String),

    #[error("Validator snapshot is empty")]
    EmptySnapshot,

    #[error("Threshold weight must be positive")]
    InvalidThreshold,

    #[error("thresholdWeight exceeds snapshot totalWeight ({threshold} > {total})")]
    ThresholdExceedsTotal { threshold: u128, total: u128 },

    #[error("Total weight overflow")]
    WeightOverflow,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SignerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignerError::InvalidSignature(_) => ErrorKind::Auth,
            SignerError::Protocol(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}

/// Result type for signer operations
pub type SignerResult<T> = Result<T, SignerError>;
