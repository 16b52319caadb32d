//! Claw Executor - execution job lifecycle
//!
//! Every intent that reaches its weighted quorum gets exactly one execution
//! job. The scheduler claims due jobs on each tick, submits them through a
//! [`ChainClient`], and records the outcome with bounded retries:
//!
//! - attempt `n` failing leaves the job FAILED_RETRYABLE for `n * base_delay`
//! - the `max_attempts`-th failure makes it FAILED_FINAL
//! - EXECUTED and FAILED_FINAL never change again
//!
//! # Usage Example
//!
//! ```ignore
//! use claw_executor::{ExecutionJobScheduler, SchedulerConfig};
//!
//! let scheduler = ExecutionJobScheduler::new(db.jobs.clone(), SchedulerConfig::default());
//! let report = scheduler.tick(chrono::Utc::now()).await?;
//! ```

pub mod attempt;
pub mod chain;
pub mod error;
pub mod job;
pub mod scheduler;

pub use attempt::RetryPolicy;
pub use chain::{ChainClient, ExecutionRequest, MockChainClient, MockOutcome, ReceiptStatus};
pub use error::{ExecutorError, ExecutorResult};
pub use job::UPDATABLE_STATES;
pub use scheduler::{ExecutionJobScheduler, JobAttemptResult, SchedulerConfig, TickReport};
