//! Execution job scheduler
//!
//! Turns quorum-approved intents into jobs and drives them through the chain
//! client on each tick. Callbacks from an external execution backend race the
//! tick on the same rows. Every write is a compare-and-swap on the status
//! ([`UPDATABLE_STATES`]) and on the version the writer read, so a writer
//! holding a stale copy fails with a conflict instead of overwriting.

use chrono::{DateTime, Duration, Utc};
use claw_core::canon::assert_uint64;
use claw_core::{ExecutionRoute, TradeIntent, B256, U256};
use claw_store::{ExecutionJobEntity, ExecutionJobRepository, ExecutionJobStatus};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::attempt::RetryPolicy;
use crate::chain::{ChainClient, ExecutionRequest, ReceiptStatus};
use crate::error::{ExecutorError, ExecutorResult};
use crate::job::{self, UPDATABLE_STATES};

/// Scheduler configuration
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub retry: RetryPolicy,
    /// Jobs claimed per tick
    pub batch_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            batch_limit: 5,
        }
    }
}

/// Result of one submission attempt within a tick
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAttemptResult {
    pub job_id: String,
    pub fund_id: String,
    pub intent_hash: B256,
    pub ok: bool,
    pub status: ExecutionJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one scheduler pass
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Retryable jobs moved back to READY
    pub released: usize,
    /// Jobs claimed for submission
    pub batch_size: usize,
    pub processed: usize,
    /// False when no chain client is configured
    pub submission_enabled: bool,
    pub results: Vec<JobAttemptResult>,
}

pub struct ExecutionJobScheduler {
    jobs: Arc<dyn ExecutionJobRepository>,
    chain: Option<Arc<dyn ChainClient>>,
    config: SchedulerConfig,
}

impl ExecutionJobScheduler {
    pub fn new(jobs: Arc<dyn ExecutionJobRepository>, config: SchedulerConfig) -> Self {
        Self {
            jobs,
            chain: None,
            config,
        }
    }

    pub fn with_chain_client(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn has_chain_client(&self) -> bool {
        self.chain.is_some()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Create the READY job for an approved intent
    pub async fn enqueue(
        &self,
        fund_id: &str,
        intent_hash: B256,
        intent: TradeIntent,
        execution_route: ExecutionRoute,
        max_notional: U256,
        now: DateTime<Utc>,
    ) -> ExecutorResult<ExecutionJobEntity> {
        let deadline = assert_uint64(intent.deadline, "deadline")?;
        let job = ExecutionJobEntity::ready(
            fund_id,
            intent_hash,
            intent,
            execution_route,
            max_notional,
            deadline,
            now,
        );
        let job = self.jobs.enqueue(job).await?;
        info!(fund_id, job_id = %job.job_id, intent_hash = %intent_hash, "execution job enqueued");
        counter!("claw_execution_jobs_total", "outcome" => "enqueued").increment(1);
        Ok(job)
    }

    pub async fn get(&self, fund_id: &str, intent_hash: &B256) -> ExecutorResult<ExecutionJobEntity> {
        self.jobs
            .get_by_intent(fund_id, intent_hash)
            .await?
            .ok_or_else(|| ExecutorError::not_found("ExecutionJob", format!("{fund_id}:{intent_hash}")))
    }

    pub async fn list(&self, fund_id: &str) -> ExecutorResult<Vec<ExecutionJobEntity>> {
        Ok(self.jobs.list_by_fund(fund_id).await?)
    }

    /// Release due retries, then submit up to `batch_limit` READY jobs
    pub async fn tick(&self, now: DateTime<Utc>) -> ExecutorResult<TickReport> {
        let released = self.jobs.release_due(now).await?;
        let Some(chain) = self.chain.as_ref() else {
            debug!(released, "execution tick without chain client");
            return Ok(TickReport {
                released,
                ..TickReport::default()
            });
        };

        let claimed = self.jobs.claim_ready(now, self.config.batch_limit).await?;
        let batch_size = claimed.len();
        let mut results = Vec::with_capacity(batch_size);
        for job in claimed {
            results.push(self.attempt(chain.as_ref(), job, now).await);
        }

        Ok(TickReport {
            released,
            batch_size,
            processed: results.len(),
            submission_enabled: true,
            results,
        })
    }

    async fn attempt(
        &self,
        chain: &dyn ChainClient,
        job: ExecutionJobEntity,
        now: DateTime<Utc>,
    ) -> JobAttemptResult {
        let job_id = job.job_id.clone();
        let fund_id = job.fund_id.clone();
        let intent_hash = job.intent_hash;

        let next = if job::deadline_passed(&job, now) {
            job::failed_final(job, "intent deadline expired", now)
        } else {
            let request = ExecutionRequest::from_job(&job);
            match submit_once(chain, &request).await {
                Ok(tx_hash) => job::executed(job, tx_hash, now).map(|mut done| {
                    done.attempt_count = done.attempt_count.saturating_add(1);
                    done
                }),
                Err(err) => {
                    let delay = self
                        .config
                        .retry
                        .delay_for_attempt(job.attempt_count.saturating_add(1));
                    warn!(fund_id = %fund_id, job_id = %job_id, error = %err, "execution attempt failed");
                    job::failed(job, err.to_string(), delay, &self.config.retry, now)
                }
            }
        };

        let stored = match next {
            Ok(next) => self
                .jobs
                .compare_and_swap(next, &[ExecutionJobStatus::Running])
                .await
                .map_err(ExecutorError::from),
            Err(err) => Err(err),
        };

        match stored {
            Ok(job) => {
                record_outcome(&job);
                JobAttemptResult {
                    job_id,
                    fund_id,
                    intent_hash,
                    ok: job.status == ExecutionJobStatus::Executed,
                    status: job.status,
                    tx_hash: job.tx_hash,
                    error: job.last_error,
                }
            }
            Err(err) => {
                // a callback moved the job while it was in flight
                warn!(fund_id = %fund_id, job_id = %job_id, error = %err, "execution result not recorded");
                JobAttemptResult {
                    job_id,
                    fund_id,
                    intent_hash,
                    ok: false,
                    status: ExecutionJobStatus::Running,
                    tx_hash: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Externally reported success; only READY or RUNNING jobs may move
    pub async fn mark_executed(
        &self,
        fund_id: &str,
        intent_hash: &B256,
        tx_hash: B256,
        now: DateTime<Utc>,
    ) -> ExecutorResult<ExecutionJobEntity> {
        let job = self.get(fund_id, intent_hash).await?;
        let next = job::executed(job, tx_hash, now)?;
        let stored = self.jobs.compare_and_swap(next, &UPDATABLE_STATES).await?;
        info!(fund_id, job_id = %stored.job_id, tx_hash = %tx_hash, "execution job executed");
        record_outcome(&stored);
        Ok(stored)
    }

    /// Externally reported failure; counts as an attempt
    pub async fn mark_failed(
        &self,
        fund_id: &str,
        intent_hash: &B256,
        reason: &str,
        retry_delay: Duration,
        now: DateTime<Utc>,
    ) -> ExecutorResult<ExecutionJobEntity> {
        let job = self.get(fund_id, intent_hash).await?;
        let next = job::failed(job, reason, retry_delay, &self.config.retry, now)?;
        let stored = self.jobs.compare_and_swap(next, &UPDATABLE_STATES).await?;
        warn!(
            fund_id,
            job_id = %stored.job_id,
            status = %stored.status,
            attempt = stored.attempt_count,
            reason,
            "execution job failed"
        );
        record_outcome(&stored);
        Ok(stored)
    }

    /// Run `tick` every `every` until the handle is aborted, handing each
    /// report that moved something to `on_report`
    pub fn spawn_tick_loop<F, Fut>(self: Arc<Self>, every: std::time::Duration, on_report: F) -> JoinHandle<()>
    where
        F: Fn(TickReport, DateTime<Utc>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let now = Utc::now();
                match self.tick(now).await {
                    Ok(report) => {
                        if report.batch_size > 0 || report.released > 0 {
                            info!(
                                released = report.released,
                                batch_size = report.batch_size,
                                "execution tick"
                            );
                        }
                        // idle ticks report too
                        on_report(report, now).await;
                    }
                    Err(err) => warn!(error = %err, "execution tick failed"),
                }
            }
        })
    }
}

async fn submit_once(chain: &dyn ChainClient, request: &ExecutionRequest) -> ExecutorResult<B256> {
    chain.preflight(request).await?;
    let nonce = chain.pending_nonce().await?;
    let tx_hash = chain.submit(request, nonce).await?;
    match chain.wait_for_receipt(tx_hash).await? {
        ReceiptStatus::Success => Ok(tx_hash),
        ReceiptStatus::Reverted => Err(ExecutorError::chain(format!("transaction {tx_hash} reverted"))),
    }
}

fn record_outcome(job: &ExecutionJobEntity) {
    let outcome = match job.status {
        ExecutionJobStatus::Executed => "executed",
        ExecutionJobStatus::FailedRetryable => "failed_retryable",
        ExecutionJobStatus::FailedFinal => "failed_final",
        ExecutionJobStatus::Ready | ExecutionJobStatus::Running => return,
    };
    counter!("claw_execution_jobs_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainClient, MockOutcome};
    use crate::job::test_support::sample_job;
    use claw_store::MemoryExecutionJobRepository;

    fn scheduler(max_attempts: u32) -> (ExecutionJobScheduler, Arc<MemoryExecutionJobRepository>) {
        let repo = Arc::new(MemoryExecutionJobRepository::new());
        let config = SchedulerConfig {
            retry: RetryPolicy::default().with_max_attempts(max_attempts),
            batch_limit: 5,
        };
        (ExecutionJobScheduler::new(repo.clone(), config), repo)
    }

    async fn enqueue_sample(s: &ExecutionJobScheduler, byte: u8, now: DateTime<Utc>) -> ExecutionJobEntity {
        let template = sample_job(byte, now);
        s.enqueue(
            &template.fund_id,
            template.intent_hash,
            template.intent,
            template.execution_route,
            template.max_notional,
            now,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_rejects_second_job_for_intent() {
        let (s, _) = scheduler(5);
        let now = Utc::now();
        let job = enqueue_sample(&s, 1, now).await;
        assert_eq!(job.status, ExecutionJobStatus::Ready);
        assert_eq!(job.attempt_count, 0);

        let template = sample_job(1, now);
        let err = s
            .enqueue(
                "fund-1",
                template.intent_hash,
                template.intent,
                template.execution_route,
                template.max_notional,
                now,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), claw_core::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_tick_without_chain_only_releases() {
        let (s, _) = scheduler(5);
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;

        let report = s.tick(now).await.unwrap();
        assert!(!report.submission_enabled);
        assert_eq!(report.batch_size, 0);
        assert_eq!(
            s.get("fund-1", &B256::repeat_byte(1)).await.unwrap().status,
            ExecutionJobStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_tick_executes_ready_job() {
        let (s, _) = scheduler(5);
        let chain = Arc::new(MockChainClient::new());
        let s = s.with_chain_client(chain.clone());
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;

        let report = s.tick(now).await.unwrap();
        assert_eq!(report.batch_size, 1);
        assert!(report.results[0].ok);

        let job = s.get("fund-1", &B256::repeat_byte(1)).await.unwrap();
        assert_eq!(job.status, ExecutionJobStatus::Executed);
        assert_eq!(job.attempt_count, 1);
        assert_eq!(job.tx_hash, report.results[0].tx_hash);
        assert_eq!(chain.submitted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_attempts_back_off_then_finalize() {
        let (s, _) = scheduler(2);
        let chain = Arc::new(MockChainClient::with_script([
            MockOutcome::Reverted,
            MockOutcome::SubmitError("nonce too low".into()),
        ]));
        let s = s.with_chain_client(chain);
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;

        let first = s.tick(now).await.unwrap();
        assert_eq!(first.results[0].status, ExecutionJobStatus::FailedRetryable);
        let job = s.get("fund-1", &B256::repeat_byte(1)).await.unwrap();
        assert_eq!(job.attempt_count, 1);
        assert_eq!(job.next_run_at, now + Duration::seconds(10));
        assert!(job.last_error.unwrap().contains("reverted"));

        // not due yet
        let idle = s.tick(now + Duration::seconds(5)).await.unwrap();
        assert_eq!(idle.batch_size, 0);

        let later = now + Duration::seconds(10);
        let second = s.tick(later).await.unwrap();
        assert_eq!(second.released, 1);
        assert_eq!(second.results[0].status, ExecutionJobStatus::FailedFinal);

        let done = s.get("fund-1", &B256::repeat_byte(1)).await.unwrap();
        assert_eq!(done.attempt_count, 2);
        assert_eq!(done.last_error.as_deref(), Some("Chain error: nonce too low"));
    }

    #[tokio::test]
    async fn test_preflight_rejection_is_retried() {
        let (s, _) = scheduler(5);
        let s = s.with_chain_client(Arc::new(MockChainClient::with_script([
            MockOutcome::PreflightRejected("approved=false".into()),
        ])));
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;

        let report = s.tick(now).await.unwrap();
        assert_eq!(report.results[0].status, ExecutionJobStatus::FailedRetryable);
        assert!(report.results[0].error.as_deref().unwrap().contains("approved=false"));
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_final() {
        let (s, _) = scheduler(5);
        let s = s.with_chain_client(Arc::new(MockChainClient::new()));
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;

        let report = s.tick(now + Duration::hours(2)).await.unwrap();
        assert_eq!(report.results[0].status, ExecutionJobStatus::FailedFinal);
    }

    #[tokio::test]
    async fn test_callbacks_guard_terminal_states() {
        let (s, _) = scheduler(5);
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;
        let hash = B256::repeat_byte(1);

        let done = s
            .mark_executed("fund-1", &hash, B256::repeat_byte(0xaa), now)
            .await
            .unwrap();
        assert_eq!(done.status, ExecutionJobStatus::Executed);

        let err = s
            .mark_executed("fund-1", &hash, B256::repeat_byte(0xbb), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidTransition { .. }));
        let err = s
            .mark_failed("fund-1", &hash, "late", Duration::seconds(30), now)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), claw_core::ErrorKind::Conflict);

        let missing = s
            .mark_executed("fund-1", &B256::repeat_byte(9), B256::ZERO, now)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), claw_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_mark_failed_counts_attempts() {
        let (s, _) = scheduler(2);
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;
        let hash = B256::repeat_byte(1);

        let first = s
            .mark_failed("fund-1", &hash, "gas", Duration::milliseconds(30_000), now)
            .await
            .unwrap();
        assert_eq!(first.status, ExecutionJobStatus::FailedRetryable);
        assert_eq!(first.next_run_at, now + Duration::seconds(30));

        // FAILED_RETRYABLE is not updatable until released
        assert!(s
            .mark_failed("fund-1", &hash, "gas", Duration::zero(), now)
            .await
            .is_err());

        s.tick(now + Duration::seconds(30)).await.unwrap();
        let second = s
            .mark_failed("fund-1", &hash, "gas", Duration::zero(), now)
            .await
            .unwrap();
        assert_eq!(second.status, ExecutionJobStatus::FailedFinal);
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_only_one_wins() {
        let (s, _) = scheduler(5);
        let s = Arc::new(s);
        let now = Utc::now();
        enqueue_sample(&s, 1, now).await;
        let hash = B256::repeat_byte(1);

        let a = {
            let s = s.clone();
            tokio::spawn(async move { s.mark_executed("fund-1", &hash, B256::repeat_byte(2), now).await })
        };
        let b = {
            let s = s.clone();
            tokio::spawn(async move {
                s.mark_failed("fund-1", &hash, "boom", Duration::seconds(1), now).await
            })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_ok() ^ b.is_ok());
    }

    #[tokio::test]
    async fn test_tick_loop_reports_idle_ticks() {
        let (s, _repo) = scheduler(3);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = Arc::new(s).spawn_tick_loop(std::time::Duration::from_millis(10), move |report, _now| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(report.batch_size);
            }
        });

        for _ in 0..2 {
            let batch = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(batch, 0);
        }
        handle.abort();
    }
}
