//! Claw Store - relayer storage contracts
//!
//! Narrow async repository traits over the relayer's persistent state, plus
//! in-memory implementations that the service uses by default and the tests
//! use everywhere.
//!
//! # Repositories
//!
//! | Trait | Holds |
//! |-------|-------|
//! | `BotRepository` | bot id, signer address, role set |
//! | `FundRepository` / `MembershipRepository` | funds and per-fund bot roles |
//! | `BotNonceRepository` | one-time `(botId, nonce)` request nonces |
//! | `SubjectRepository` | claims and intents with quorum status |
//! | `AttestationRepository` | accepted attestations, last nonce per verifier |
//! | `EpochRepository` | epochs and their finalized snapshots |
//! | `ExecutionJobRepository` | execution jobs with guarded transitions |
//! | `OutboxRepository` | append-only event log |
//!
//! # Usage Example
//!
//! ```ignore
//! use claw_store::RelayerDatabase;
//!
//! let db = RelayerDatabase::in_memory();
//! let fund = db.funds.get("fund-1").await?;
//! ```

pub mod entities;
pub mod error;
pub mod repos;

pub use entities::*;
pub use error::*;
pub use repos::*;

use std::sync::Arc;

/// Relayer database facade
#[derive(Clone)]
pub struct RelayerDatabase {
    pub bots: Arc<dyn BotRepository>,
    pub funds: Arc<dyn FundRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub bot_nonces: Arc<dyn BotNonceRepository>,
    pub subjects: Arc<dyn SubjectRepository>,
    pub attestations: Arc<dyn AttestationRepository>,
    pub epochs: Arc<dyn EpochRepository>,
    pub jobs: Arc<dyn ExecutionJobRepository>,
    pub outbox: Arc<dyn OutboxRepository>,
}

impl RelayerDatabase {
    /// Every repository backed by process memory
    pub fn in_memory() -> Self {
        Self {
            bots: Arc::new(MemoryBotRepository::new()),
            funds: Arc::new(MemoryFundRepository::new()),
            memberships: Arc::new(MemoryMembershipRepository::new()),
            bot_nonces: Arc::new(MemoryBotNonceRepository::new()),
            subjects: Arc::new(MemorySubjectRepository::new()),
            attestations: Arc::new(MemoryAttestationRepository::new()),
            epochs: Arc::new(MemoryEpochRepository::new()),
            jobs: Arc::new(MemoryExecutionJobRepository::new()),
            outbox: Arc::new(MemoryOutboxRepository::new()),
        }
    }

    /// Swap the outbox backend
    pub fn with_outbox(mut self, outbox: Arc<dyn OutboxRepository>) -> Self {
        self.outbox = outbox;
        self
    }

    /// Swap the execution job backend
    pub fn with_jobs(mut self, jobs: Arc<dyn ExecutionJobRepository>) -> Self {
        self.jobs = jobs;
        self
    }
}

impl Default for RelayerDatabase {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for RelayerDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerDatabase").finish_non_exhaustive()
    }
}
