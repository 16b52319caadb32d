//! Subject, attestation and epoch repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::{Address, SubjectType, B256, U256};

use crate::entities::{subject_key, AttestationEntity, EpochEntity, SubjectEntity};
use crate::error::{StoreError, StoreResult};

/// Claims and intents under attestation
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Insert a new subject, failing with `Duplicate` if it exists
    async fn insert_new(&self, entity: SubjectEntity) -> StoreResult<SubjectEntity>;

    /// Insert unless present; returns the stored subject either way
    async fn get_or_insert(&self, entity: SubjectEntity) -> StoreResult<SubjectEntity>;

    async fn get(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
    ) -> StoreResult<Option<SubjectEntity>>;

    async fn get_required(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
    ) -> StoreResult<SubjectEntity> {
        self.get(fund_id, subject_type, subject_hash)
            .await?
            .ok_or_else(|| {
                StoreError::not_found(
                    subject_type.label(),
                    subject_key(fund_id, subject_type, subject_hash),
                )
            })
    }

    /// Raise the stored weight. Attester sets only grow, so a lower value
    /// from a racing writer is ignored.
    async fn update_weight(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
        attested_weight: u128,
    ) -> StoreResult<SubjectEntity>;

    /// PENDING to APPROVED. Returns `false` if it was already approved.
    async fn mark_approved(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Approved claim hashes of an epoch, in no particular order
    async fn list_approved_claims(&self, fund_id: &str, epoch_id: u64) -> StoreResult<Vec<B256>>;

    async fn count(&self) -> StoreResult<usize>;
}

/// Accepted attestations
#[async_trait]
pub trait AttestationRepository: Send + Sync {
    /// Atomically check the verifier's nonce against its last accepted nonce
    /// for the subject type, reject a second attestation of the same subject
    /// by the same verifier, then record both.
    async fn insert(&self, entity: AttestationEntity) -> StoreResult<AttestationEntity>;

    /// Last accepted nonce for `(verifier, subject_type)`
    async fn last_nonce(
        &self,
        verifier: &Address,
        subject_type: SubjectType,
    ) -> StoreResult<Option<U256>>;

    /// Distinct verifiers with an accepted attestation on the subject
    async fn list_attesters(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
    ) -> StoreResult<Vec<Address>>;

    async fn count(&self) -> StoreResult<usize>;
}

/// Epochs of each fund
#[async_trait]
pub trait EpochRepository: Send + Sync {
    /// Returns `true` if this call opened the epoch
    async fn open_if_absent(
        &self,
        fund_id: &str,
        epoch_id: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn record_snapshot(
        &self,
        fund_id: &str,
        epoch_id: u64,
        snapshot_hash: B256,
        epoch_state_hash: B256,
        claim_count: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<EpochEntity>;

    async fn get(&self, fund_id: &str, epoch_id: u64) -> StoreResult<Option<EpochEntity>>;
}
