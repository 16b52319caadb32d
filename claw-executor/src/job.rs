//! Execution job state machine
//!
//! ```text
//! READY -> RUNNING -> EXECUTED
//!                  -> FAILED_RETRYABLE -> (next_run_at) -> READY
//!                  -> FAILED_FINAL
//! ```
//!
//! Externally reported outcomes may also move a job straight out of READY.
//! EXECUTED and FAILED_FINAL are terminal.

use chrono::{DateTime, Duration, Utc};
use claw_core::B256;
use claw_store::{ExecutionJobEntity, ExecutionJobStatus};

use crate::attempt::RetryPolicy;
use crate::error::{ExecutorError, ExecutorResult};

/// States a job may report an outcome from
pub const UPDATABLE_STATES: [ExecutionJobStatus; 2] =
    [ExecutionJobStatus::Ready, ExecutionJobStatus::Running];

pub fn ensure_updatable(job: &ExecutionJobEntity, to: ExecutionJobStatus) -> ExecutorResult<()> {
    if UPDATABLE_STATES.contains(&job.status) {
        Ok(())
    } else {
        Err(ExecutorError::invalid_transition(&job.job_id, job.status, to))
    }
}

/// Mark the job executed with its transaction hash
pub fn executed(
    mut job: ExecutionJobEntity,
    tx_hash: B256,
    now: DateTime<Utc>,
) -> ExecutorResult<ExecutionJobEntity> {
    ensure_updatable(&job, ExecutionJobStatus::Executed)?;
    job.status = ExecutionJobStatus::Executed;
    job.tx_hash = Some(tx_hash);
    job.last_error = None;
    job.updated_at = now;
    Ok(job)
}

/// Record a failed attempt. The job becomes FAILED_FINAL once the policy is
/// exhausted, otherwise FAILED_RETRYABLE until `now + retry_delay`.
pub fn failed(
    mut job: ExecutionJobEntity,
    reason: impl Into<String>,
    retry_delay: Duration,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> ExecutorResult<ExecutionJobEntity> {
    let attempt_count = job.attempt_count.saturating_add(1);
    let to = if policy.is_exhausted(attempt_count) {
        ExecutionJobStatus::FailedFinal
    } else {
        ExecutionJobStatus::FailedRetryable
    };
    ensure_updatable(&job, to)?;

    job.status = to;
    job.attempt_count = attempt_count;
    job.next_run_at = now + retry_delay.max(Duration::zero());
    job.last_error = Some(reason.into());
    job.updated_at = now;
    Ok(job)
}

/// Terminal failure that retrying cannot fix, such as a passed deadline
pub fn failed_final(
    mut job: ExecutionJobEntity,
    reason: impl Into<String>,
    now: DateTime<Utc>,
) -> ExecutorResult<ExecutionJobEntity> {
    ensure_updatable(&job, ExecutionJobStatus::FailedFinal)?;
    job.status = ExecutionJobStatus::FailedFinal;
    job.attempt_count = job.attempt_count.saturating_add(1);
    job.last_error = Some(reason.into());
    job.updated_at = now;
    Ok(job)
}

/// Whether the intent deadline has passed at `now`
pub fn deadline_passed(job: &ExecutionJobEntity, now: DateTime<Utc>) -> bool {
    u64::try_from(now.timestamp()).map_or(false, |now| job.deadline <= now)
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_job;
    use super::*;

    #[test]
    fn test_executed_from_ready_or_running() {
        let now = Utc::now();
        let tx = B256::repeat_byte(0xee);

        let done = executed(sample_job(1, now), tx, now).unwrap();
        assert_eq!(done.status, ExecutionJobStatus::Executed);
        assert_eq!(done.tx_hash, Some(tx));

        let mut running = sample_job(1, now);
        running.status = ExecutionJobStatus::Running;
        assert!(executed(running, tx, now).is_ok());
    }

    #[test]
    fn test_terminal_jobs_reject_callbacks() {
        let now = Utc::now();
        let policy = RetryPolicy::default();
        let done = executed(sample_job(1, now), B256::repeat_byte(1), now).unwrap();

        let err = executed(done.clone(), B256::repeat_byte(2), now).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidTransition { .. }));
        let err = failed(done, "late", Duration::seconds(30), &policy, now).unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidTransition { .. }));

        let mut final_job = sample_job(2, now);
        final_job.status = ExecutionJobStatus::FailedFinal;
        assert!(executed(final_job, B256::repeat_byte(3), now).is_err());

        let mut waiting = sample_job(3, now);
        waiting.status = ExecutionJobStatus::FailedRetryable;
        assert!(executed(waiting, B256::repeat_byte(4), now).is_err());
    }

    #[test]
    fn test_failed_retries_until_exhausted() {
        let now = Utc::now();
        let policy = RetryPolicy::default().with_max_attempts(2);

        let first = failed(sample_job(1, now), "revert", Duration::seconds(10), &policy, now).unwrap();
        assert_eq!(first.status, ExecutionJobStatus::FailedRetryable);
        assert_eq!(first.attempt_count, 1);
        assert_eq!(first.next_run_at, now + Duration::seconds(10));
        assert_eq!(first.last_error.as_deref(), Some("revert"));

        let mut again = first;
        again.status = ExecutionJobStatus::Running;
        let second = failed(again, "revert", Duration::seconds(20), &policy, now).unwrap();
        assert_eq!(second.status, ExecutionJobStatus::FailedFinal);
        assert_eq!(second.attempt_count, 2);
    }

    #[test]
    fn test_negative_delay_clamped() {
        let now = Utc::now();
        let job = failed(
            sample_job(1, now),
            "x",
            Duration::seconds(-5),
            &RetryPolicy::default(),
            now,
        )
        .unwrap();
        assert_eq!(job.next_run_at, now);
    }

    #[test]
    fn test_deadline_passed() {
        let now = Utc::now();
        let mut job = sample_job(1, now);
        assert!(!deadline_passed(&job, now));
        job.deadline = now.timestamp() as u64;
        assert!(deadline_passed(&job, now));
    }
}
