//! Execution job entity

use chrono::{DateTime, Utc};
use claw_core::{ExecutionRoute, TradeIntent, B256, U256};
use serde::{Deserialize, Serialize};

/// Execution job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionJobStatus {
    Ready,
    Running,
    Executed,
    FailedRetryable,
    FailedFinal,
}

impl ExecutionJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Executed => "EXECUTED",
            Self::FailedRetryable => "FAILED_RETRYABLE",
            Self::FailedFinal => "FAILED_FINAL",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::FailedFinal)
    }
}

impl std::fmt::Display for ExecutionJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution job for one approved intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionJobEntity {
    pub job_id: String,
    pub fund_id: String,
    pub intent_hash: B256,
    pub status: ExecutionJobStatus,
    pub attempt_count: u32,
    pub next_run_at: DateTime<Utc>,
    pub intent: TradeIntent,
    pub execution_route: ExecutionRoute,
    #[serde(with = "claw_core::serde_u256")]
    pub max_notional: U256,
    pub deadline: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by every stored write. A compare-and-swap must carry the
    /// version it read.
    #[serde(default)]
    pub version: u64,
}

impl ExecutionJobEntity {
    /// New READY job, runnable immediately
    pub fn ready(
        fund_id: impl Into<String>,
        intent_hash: B256,
        intent: TradeIntent,
        execution_route: ExecutionRoute,
        max_notional: U256,
        deadline: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            fund_id: fund_id.into(),
            intent_hash,
            status: ExecutionJobStatus::Ready,
            attempt_count: 0,
            next_run_at: now,
            intent,
            execution_route,
            max_notional,
            deadline,
            tx_hash: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}
