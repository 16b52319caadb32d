//! Claw Store Error Types

use claw_core::{ErrorKind, ProtocolError};
use thiserror::Error;

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Unique key already taken
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate { entity_type: String, id: String },

    /// Conditional update found the row in another state
    #[error("Stale state for {entity_type} {id}: expected one of [{expected}], found {actual}")]
    StaleState {
        entity_type: String,
        id: String,
        expected: String,
        actual: String,
    },

    /// Insert rejected by a replay rule
    #[error("Replay rejected: {0}")]
    Replay(#[from] ProtocolError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend unavailable or failed
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Duplicate { .. } | StoreError::StaleState { .. } => ErrorKind::Conflict,
            StoreError::Replay(e) => e.kind(),
            StoreError::Serialization(_) => ErrorKind::Validation,
            StoreError::Database(_) => ErrorKind::Transient,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
