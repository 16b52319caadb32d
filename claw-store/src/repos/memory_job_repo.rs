//! In-memory execution job repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::B256;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::job_repo::ExecutionJobRepository;
use crate::entities::{ExecutionJobEntity, ExecutionJobStatus};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
struct JobTables {
    jobs: HashMap<String, ExecutionJobEntity>,
    by_intent: HashMap<(String, B256), String>,
}

/// Jobs keyed by id with a unique `(fund_id, intent_hash)` index. One write
/// lock guards each transition.
#[derive(Default)]
pub struct MemoryExecutionJobRepository {
    tables: RwLock<JobTables>,
}

impl MemoryExecutionJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first(jobs: &mut [ExecutionJobEntity]) {
    jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
}

fn status_list(statuses: &[ExecutionJobStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl ExecutionJobRepository for MemoryExecutionJobRepository {
    async fn enqueue(&self, job: ExecutionJobEntity) -> StoreResult<ExecutionJobEntity> {
        let mut tables = self.tables.write().await;
        let index_key = (job.fund_id.clone(), job.intent_hash);
        if tables.by_intent.contains_key(&index_key) {
            return Err(StoreError::duplicate(
                "ExecutionJob",
                format!("{}:{}", job.fund_id, job.intent_hash),
            ));
        }
        tables.by_intent.insert(index_key, job.job_id.clone());
        tables.jobs.insert(job.job_id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> StoreResult<Option<ExecutionJobEntity>> {
        Ok(self.tables.read().await.jobs.get(job_id).cloned())
    }

    async fn get_by_intent(
        &self,
        fund_id: &str,
        intent_hash: &B256,
    ) -> StoreResult<Option<ExecutionJobEntity>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_intent
            .get(&(fund_id.to_string(), *intent_hash))
            .and_then(|id| tables.jobs.get(id))
            .cloned())
    }

    async fn list_by_fund(&self, fund_id: &str) -> StoreResult<Vec<ExecutionJobEntity>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<_> = tables
            .jobs
            .values()
            .filter(|j| j.fund_id == fund_id)
            .cloned()
            .collect();
        oldest_first(&mut jobs);
        Ok(jobs)
    }

    async fn release_due(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let mut released = 0;
        for job in tables.jobs.values_mut() {
            if job.status == ExecutionJobStatus::FailedRetryable && job.next_run_at <= now {
                job.status = ExecutionJobStatus::Ready;
                job.updated_at = now;
                job.version += 1;
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "retryable jobs released");
        }
        Ok(released)
    }

    async fn claim_ready(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<ExecutionJobEntity>> {
        let mut tables = self.tables.write().await;
        let mut due: Vec<_> = tables
            .jobs
            .values()
            .filter(|j| j.status == ExecutionJobStatus::Ready && j.next_run_at <= now)
            .cloned()
            .collect();
        oldest_first(&mut due);
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for job in due {
            if let Some(stored) = tables.jobs.get_mut(&job.job_id) {
                stored.status = ExecutionJobStatus::Running;
                stored.updated_at = now;
                stored.version += 1;
                claimed.push(stored.clone());
            }
        }
        debug!(claimed = claimed.len(), limit, "ready jobs claimed");
        Ok(claimed)
    }

    async fn compare_and_swap(
        &self,
        job: ExecutionJobEntity,
        expected: &[ExecutionJobStatus],
    ) -> StoreResult<ExecutionJobEntity> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .jobs
            .get_mut(&job.job_id)
            .ok_or_else(|| StoreError::not_found("ExecutionJob", job.job_id.clone()))?;
        if !expected.contains(&stored.status) {
            return Err(StoreError::StaleState {
                entity_type: "ExecutionJob".to_string(),
                id: job.job_id.clone(),
                expected: status_list(expected),
                actual: stored.status.to_string(),
            });
        }
        if stored.version != job.version {
            return Err(StoreError::StaleState {
                entity_type: "ExecutionJob".to_string(),
                id: job.job_id.clone(),
                expected: format!("version {}", job.version),
                actual: format!("version {}", stored.version),
            });
        }
        let next = ExecutionJobEntity {
            version: stored.version + 1,
            ..job
        };
        *stored = next.clone();
        Ok(next)
    }

    async fn count_by_status(&self, status: ExecutionJobStatus) -> StoreResult<usize> {
        let tables = self.tables.read().await;
        Ok(tables.jobs.values().filter(|j| j.status == status).count())
    }
}
