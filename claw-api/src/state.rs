//! Application State
//!
//! Shared state for the relayer service.

use chrono::{DateTime, Utc};
use claw_executor::{
    ChainClient, ExecutionJobScheduler, JobAttemptResult, RetryPolicy, SchedulerConfig, TickReport,
};
use claw_store::{EventType, ExecutionJobEntity, ExecutionJobStatus, RelayerDatabase};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::BotAuthGateway;
use crate::config::RelayerConfig;
use crate::dto::{CronTickResponse, RelayerCounts};
use crate::error::ApiResult;
use crate::gateway::AttestationGateway;
use crate::outbox::EventOutbox;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub service_name: String,
    pub version: String,
    pub listen_addr: String,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            service_name: "claw-relayer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            enable_cors: true,
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ApiConfig,
    pub relayer: RelayerConfig,
    pub db: RelayerDatabase,
    pub auth: BotAuthGateway,
    pub attestations: AttestationGateway,
    pub outbox: Arc<EventOutbox>,
    pub scheduler: Arc<ExecutionJobScheduler>,
    pub started_at: DateTime<Utc>,
    request_counter: RwLock<u64>,
}

impl AppState {
    /// State without a chain client; execution is driven by callbacks
    pub fn new(config: ApiConfig, relayer: RelayerConfig, db: RelayerDatabase) -> Self {
        Self::assemble(config, relayer, db, None)
    }

    /// State whose ticks submit READY jobs through `chain`
    pub fn with_chain_client(
        config: ApiConfig,
        relayer: RelayerConfig,
        db: RelayerDatabase,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self::assemble(config, relayer, db, Some(chain))
    }

    fn assemble(
        config: ApiConfig,
        relayer: RelayerConfig,
        db: RelayerDatabase,
        chain: Option<Arc<dyn ChainClient>>,
    ) -> Self {
        let scheduler_config = SchedulerConfig {
            retry: RetryPolicy::default()
                .with_max_attempts(relayer.execution.max_attempts)
                .with_base_delay(chrono::Duration::seconds(relayer.execution.retry_base_secs)),
            batch_limit: relayer.execution.batch_limit,
        };
        let mut scheduler = ExecutionJobScheduler::new(db.jobs.clone(), scheduler_config);
        if let Some(chain) = chain {
            scheduler = scheduler.with_chain_client(chain);
        }
        let scheduler = Arc::new(scheduler);
        let outbox = Arc::new(EventOutbox::new(db.outbox.clone(), relayer.outbox.clone()));
        let auth = BotAuthGateway::new(db.bots.clone(), db.bot_nonces.clone(), db.memberships.clone());
        let attestations = AttestationGateway::new(db.clone(), outbox.clone(), scheduler.clone(), &relayer);

        Self {
            config,
            relayer,
            db,
            auth,
            attestations,
            outbox,
            scheduler,
            started_at: Utc::now(),
            request_counter: RwLock::new(0),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    pub async fn increment_requests(&self) -> u64 {
        let mut counter = self.request_counter.write().await;
        *counter += 1;
        *counter
    }

    pub async fn request_count(&self) -> u64 {
        *self.request_counter.read().await
    }

    // ============================================
    // Execution
    // ============================================

    /// One scheduler pass plus nonce housekeeping
    pub async fn execution_tick(&self, now: DateTime<Utc>) -> ApiResult<CronTickResponse> {
        let report = self.scheduler.tick(now).await?;
        let pruned_nonces = self.finish_tick(&report, now).await?;
        Ok(CronTickResponse {
            report,
            pruned_nonces,
        })
    }

    /// Publish a tick's outcomes and prune stale bot nonces.
    ///
    /// Shared by the cron endpoint and the background loop; returns the
    /// number of nonces dropped.
    pub async fn finish_tick(&self, report: &TickReport, now: DateTime<Utc>) -> ApiResult<usize> {
        self.publish_tick_outcomes(report).await;
        self.auth.prune_nonces(now).await
    }

    /// Emit `intent:executed` / `intent:failed` for jobs a tick moved
    pub async fn publish_tick_outcomes(&self, report: &TickReport) {
        for result in &report.results {
            self.publish_attempt(result).await;
        }
    }

    async fn publish_attempt(&self, result: &JobAttemptResult) {
        let event_type = match result.status {
            ExecutionJobStatus::Executed => EventType::IntentExecuted,
            ExecutionJobStatus::FailedRetryable | ExecutionJobStatus::FailedFinal => {
                EventType::IntentFailed
            }
            ExecutionJobStatus::Ready | ExecutionJobStatus::Running => return,
        };
        self.outbox
            .announce(
                event_type,
                &result.fund_id,
                json!({
                    "intentHash": result.intent_hash,
                    "jobId": result.job_id,
                    "status": result.status,
                    "txHash": result.tx_hash,
                    "error": result.error,
                }),
            )
            .await;
    }

    /// Emit the event matching a job's state after a callback
    pub async fn publish_job(&self, job: &ExecutionJobEntity) {
        let event_type = match job.status {
            ExecutionJobStatus::Executed => EventType::IntentExecuted,
            _ => EventType::IntentFailed,
        };
        self.outbox
            .announce(
                event_type,
                &job.fund_id,
                json!({
                    "intentHash": job.intent_hash,
                    "jobId": job.job_id,
                    "status": job.status,
                    "attemptCount": job.attempt_count,
                    "txHash": job.tx_hash,
                    "error": job.last_error,
                    "nextRunAt": job.next_run_at,
                }),
            )
            .await;
    }

    // ============================================
    // Health
    // ============================================

    pub async fn counts(&self) -> ApiResult<RelayerCounts> {
        Ok(RelayerCounts {
            bots: self.db.bots.count().await?,
            funds: self.db.funds.count().await?,
            subjects: self.db.subjects.count().await?,
            attestations: self.db.attestations.count().await?,
            jobs_ready: self.db.jobs.count_by_status(ExecutionJobStatus::Ready).await?,
            jobs_failed_final: self
                .db
                .jobs
                .count_by_status(ExecutionJobStatus::FailedFinal)
                .await?,
            last_event_id: self.outbox.latest_id().await?,
            event_subscribers: self.outbox.subscriber_count(),
        })
    }
}

/// Health status of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Component health check result
#[derive(Debug, Clone)]
pub struct ComponentHealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl ComponentHealthCheck {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}
