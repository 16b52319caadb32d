//! Executor Error Types

use claw_core::{ErrorKind, ProtocolError};
use claw_store::{ExecutionJobStatus, StoreError};
use thiserror::Error;

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Job is not in a state the transition may start from
    #[error("Invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: ExecutionJobStatus,
        to: ExecutionJobStatus,
    },

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// RPC or transaction failure
    #[error("Chain error: {0}")]
    Chain(String),

    /// Preflight validation rejected the execution request
    #[error("Preflight failed: {0}")]
    Preflight(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecutorError {
    pub fn invalid_transition(
        job_id: impl Into<String>,
        from: ExecutionJobStatus,
        to: ExecutionJobStatus,
    ) -> Self {
        Self::InvalidTransition {
            job_id: job_id.into(),
            from,
            to,
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn chain(message: impl Into<String>) -> Self {
        Self::Chain(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::InvalidTransition { .. } => ErrorKind::Conflict,
            ExecutorError::NotFound { .. } => ErrorKind::NotFound,
            ExecutorError::Chain(_) => ErrorKind::Transient,
            ExecutorError::Preflight(_) => ErrorKind::Validation,
            ExecutorError::Protocol(e) => e.kind(),
            ExecutorError::Store(e) => e.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = ExecutorError::invalid_transition(
            "job-1",
            ExecutionJobStatus::Executed,
            ExecutionJobStatus::FailedRetryable,
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("EXECUTED -> FAILED_RETRYABLE"));

        assert!(ExecutorError::chain("rpc timeout").is_retryable());
        assert!(!ExecutorError::Preflight("not approved".into()).is_retryable());

        let stale = ExecutorError::from(StoreError::StaleState {
            entity_type: "ExecutionJob".into(),
            id: "job-1".into(),
            expected: "READY, RUNNING".into(),
            actual: "EXECUTED".into(),
        });
        assert_eq!(stale.kind(), ErrorKind::Conflict);
    }
}
