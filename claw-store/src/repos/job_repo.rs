//! Execution job repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::B256;

use crate::entities::{ExecutionJobEntity, ExecutionJobStatus};
use crate::error::{StoreError, StoreResult};

/// Execution job repository. Every state change goes through
/// `compare_and_swap` or the two batch transitions, so two writers racing on
/// one job cannot both win.
#[async_trait]
pub trait ExecutionJobRepository: Send + Sync {
    /// Insert a job, failing with `Duplicate` if the intent already has one
    async fn enqueue(&self, job: ExecutionJobEntity) -> StoreResult<ExecutionJobEntity>;

    async fn get(&self, job_id: &str) -> StoreResult<Option<ExecutionJobEntity>>;

    async fn get_by_intent(
        &self,
        fund_id: &str,
        intent_hash: &B256,
    ) -> StoreResult<Option<ExecutionJobEntity>>;

    async fn get_required_by_intent(
        &self,
        fund_id: &str,
        intent_hash: &B256,
    ) -> StoreResult<ExecutionJobEntity> {
        self.get_by_intent(fund_id, intent_hash)
            .await?
            .ok_or_else(|| StoreError::not_found("ExecutionJob", format!("{fund_id}:{intent_hash}")))
    }

    /// Jobs of a fund, oldest first
    async fn list_by_fund(&self, fund_id: &str) -> StoreResult<Vec<ExecutionJobEntity>>;

    /// Move FAILED_RETRYABLE jobs whose `next_run_at` has passed back to READY
    async fn release_due(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Move up to `limit` due READY jobs to RUNNING, oldest first, and return them
    async fn claim_ready(&self, now: DateTime<Utc>, limit: usize)
        -> StoreResult<Vec<ExecutionJobEntity>>;

    /// Replace the stored job if its current status is one of `expected` and
    /// its version still equals `job.version`, otherwise fail with
    /// `StaleState`. The stored copy comes back with the bumped version.
    async fn compare_and_swap(
        &self,
        job: ExecutionJobEntity,
        expected: &[ExecutionJobStatus],
    ) -> StoreResult<ExecutionJobEntity>;

    async fn count_by_status(&self, status: ExecutionJobStatus) -> StoreResult<usize>;
}
