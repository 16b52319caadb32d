//! Attestation Gateway
//!
//! Claims and intents share one acceptance pipeline:
//!
//! ```text
//!  signed attestation
//!        │
//!        ▼
//!  ┌──────────────┐  403   verifier not allowlisted
//!  │  allowlist   │──────▶
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐  400   expired / unrecoverable / address mismatch
//!  │   envelope   │──────▶
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐  400   nonce not above last accepted nonce
//!  │    nonce     │──────▶
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐  403   zero weight in the subject's snapshot
//!  │    weight    │──────▶
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐  409   same verifier already attested the subject
//!  │    insert    │──────▶
//!  └──────┬───────┘
//!         ▼
//!  recompute weight from distinct attesters
//!         │
//!         ▼ threshold met (first time only)
//!  claim:  recompute and record the epoch snapshot
//!  intent: enqueue the execution job
//! ```
//!
//! The store's atomic insert (nonce check plus uniqueness) is what keeps
//! concurrent duplicates from counting twice; `mark_approved` returns true
//! for exactly one caller, so follow-up work runs once.

use chrono::{DateTime, Utc};
use claw_core::canon::{unique_sorted, validate_intent};
use claw_core::replay::assert_nonce_strictly_increases;
use claw_core::{
    claim_hash, epoch_state_hash, intent_hash, merkle_root, route_allowlist_hash, snapshot_hash,
    ClaimPayload, SubjectType, B256,
};
use claw_executor::ExecutionJobScheduler;
use claw_signer::{
    verify_envelope, AttestationDomain, AttestationMessage, ClaimAttestationMessage,
    EnvelopeFailure, EnvelopeVerification, IntentAttestationMessage, ValidatorSnapshot,
};
use claw_store::{AttestationEntity, EventType, RelayerDatabase, SubjectEntity, SubjectStatus};
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{QuorumPolicy, RelayerConfig};
use crate::dto::{
    AttestationReceipt, EpochSnapshotResponse, IntentProposal, ProposeIntentResponse,
    SignedAttestation, SubmitClaimResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::outbox::EventOutbox;

/// Subject ingestion and weighted-quorum aggregation
pub struct AttestationGateway {
    db: RelayerDatabase,
    outbox: Arc<EventOutbox>,
    scheduler: Arc<ExecutionJobScheduler>,
    quorum: QuorumPolicy,
    claim_domain: AttestationDomain,
    intent_domain: AttestationDomain,
}

impl AttestationGateway {
    pub fn new(
        db: RelayerDatabase,
        outbox: Arc<EventOutbox>,
        scheduler: Arc<ExecutionJobScheduler>,
        config: &RelayerConfig,
    ) -> Self {
        Self {
            db,
            outbox,
            scheduler,
            quorum: config.quorum.clone(),
            claim_domain: config.claim_domain(),
            intent_domain: config.intent_domain(),
        }
    }

    pub fn quorum(&self) -> &QuorumPolicy {
        &self.quorum
    }

    // ============================================
    // Subjects
    // ============================================

    /// Store a claim under its canonical hash. The first claim of an epoch
    /// opens the epoch.
    pub async fn submit_claim(
        &self,
        fund_id: &str,
        epoch_id: u64,
        claim: ClaimPayload,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<SubmitClaimResponse> {
        let hash = claim_hash(&claim)?;
        let threshold = self.quorum.claim_snapshot(fund_id, epoch_id)?.threshold_weight;
        let payload = serde_json::to_value(&claim)
            .map_err(|e| ApiError::internal(format!("claim payload: {e}")))?;

        let subject = SubjectEntity::pending(fund_id, SubjectType::Claim, hash, Some(epoch_id), threshold)
            .with_payload(payload, submitted_by);
        let subject = self.db.subjects.insert_new(subject).await?;
        info!(fund_id, epoch_id, claim_hash = %hash, bot_id = submitted_by, "claim submitted");

        let epoch_opened = self.open_epoch(fund_id, epoch_id, now).await?;

        Ok(SubmitClaimResponse {
            fund_id: fund_id.to_string(),
            epoch_id,
            claim_hash: hash,
            status: subject.status,
            threshold_weight: threshold.to_string(),
            epoch_opened,
        })
    }

    /// Validate and store an intent with its execution route
    pub async fn propose_intent(
        &self,
        fund_id: &str,
        proposal: IntentProposal,
        proposed_by: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<ProposeIntentResponse> {
        let canonical = validate_intent(&proposal.intent, unix_secs(now))?;
        proposal.execution_route.ensure_matches(&canonical)?;
        let allowlist_hash = route_allowlist_hash(&proposal.execution_route)?;
        if proposal.max_notional.is_zero() {
            return Err(ApiError::validation("maxNotional must be positive"));
        }
        if canonical.amount_in > proposal.max_notional {
            return Err(ApiError::validation("intent amountIn exceeds maxNotional"));
        }

        let hash = intent_hash(&proposal.intent)?;
        let threshold = self.quorum.intent_snapshot(fund_id)?.threshold_weight;
        let payload = serde_json::to_value(&proposal)
            .map_err(|e| ApiError::internal(format!("intent payload: {e}")))?;
        let subject = SubjectEntity::pending(fund_id, SubjectType::Intent, hash, None, threshold)
            .with_payload(payload, proposed_by);
        let subject = self.db.subjects.insert_new(subject).await?;
        info!(fund_id, intent_hash = %hash, bot_id = proposed_by, "intent proposed");

        self.outbox
            .announce(
                EventType::IntentProposed,
                fund_id,
                json!({
                    "intentHash": hash,
                    "allowlistHash": allowlist_hash,
                    "proposedBy": proposed_by,
                    "thresholdWeight": threshold.to_string(),
                }),
            )
            .await;

        Ok(ProposeIntentResponse {
            fund_id: fund_id.to_string(),
            intent_hash: hash,
            allowlist_hash,
            status: subject.status,
            threshold_weight: threshold.to_string(),
        })
    }

    // ============================================
    // Attestations
    // ============================================

    /// Accept one claim attestation. An unseen claim hash is registered as
    /// a pending subject of the attested epoch.
    pub async fn attest_claim(
        &self,
        fund_id: &str,
        attestation: &SignedAttestation<ClaimAttestationMessage>,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<AttestationReceipt> {
        let message = &attestation.message;
        let result = async {
            let snapshot = self.quorum.claim_snapshot(fund_id, message.epoch_id)?;
            self.screen(&self.claim_domain, &snapshot, message, &attestation.signature, now)
                .await?;

            let subject = self
                .db
                .subjects
                .get_or_insert(SubjectEntity::pending(
                    fund_id,
                    SubjectType::Claim,
                    message.claim_hash,
                    Some(message.epoch_id),
                    snapshot.threshold_weight,
                ))
                .await?;
            if subject.epoch_id != Some(message.epoch_id) {
                return Err(ApiError::validation(format!(
                    "claim {} belongs to epoch {:?}, attested for epoch {}",
                    message.claim_hash, subject.epoch_id, message.epoch_id
                )));
            }
            self.open_epoch(fund_id, message.epoch_id, now).await?;

            self.record(fund_id, &snapshot, subject, message, &attestation.signature, submitted_by, now)
                .await
        }
        .await;
        observe(SubjectType::Claim, fund_id, message.claim_hash, &result);
        result
    }

    /// Accept one intent attestation; the intent must have been proposed
    pub async fn attest_intent(
        &self,
        fund_id: &str,
        attestation: &SignedAttestation<IntentAttestationMessage>,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<AttestationReceipt> {
        let message = &attestation.message;
        let result = async {
            let subject = self
                .db
                .subjects
                .get_required(fund_id, SubjectType::Intent, &message.intent_hash)
                .await?;
            let snapshot = self.quorum.intent_snapshot(fund_id)?;
            self.screen(&self.intent_domain, &snapshot, message, &attestation.signature, now)
                .await?;

            self.record(fund_id, &snapshot, subject, message, &attestation.signature, submitted_by, now)
                .await
        }
        .await;
        observe(SubjectType::Intent, fund_id, message.intent_hash, &result);
        result
    }

    /// Allowlist, envelope, nonce and weight checks; nothing is written
    async fn screen<M: AttestationMessage>(
        &self,
        domain: &AttestationDomain,
        snapshot: &ValidatorSnapshot,
        message: &M,
        signature: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<()> {
        let verifier = message.verifier();
        if !self.quorum.is_allowed(&verifier) {
            return Err(ApiError::forbidden(format!("verifier {verifier} is not allowlisted")));
        }

        match verify_envelope(domain, message, signature, unix_secs(now)) {
            EnvelopeVerification::Verified { .. } => {}
            rejected @ EnvelopeVerification::Rejected { .. } => {
                let summary = rejected.summary();
                return Err(match rejected.failure() {
                    Some(EnvelopeFailure::Expired) => ApiError::replay(summary),
                    _ => ApiError::validation(summary),
                });
            }
        }

        let last = self.db.attestations.last_nonce(&verifier, M::SUBJECT).await?;
        assert_nonce_strictly_increases(last, message.nonce())?;

        if snapshot.weight_of(&verifier) == 0 {
            return Err(ApiError::forbidden(format!(
                "verifier {verifier} has no weight in snapshot {}",
                snapshot.snapshot_id
            )));
        }
        Ok(())
    }

    /// Insert, re-evaluate the threshold, publish, and run approval follow-ups
    #[allow(clippy::too_many_arguments)]
    async fn record<M: AttestationMessage>(
        &self,
        fund_id: &str,
        snapshot: &ValidatorSnapshot,
        subject: SubjectEntity,
        message: &M,
        signature: &str,
        submitted_by: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<AttestationReceipt> {
        let subject_type = M::SUBJECT;
        let subject_hash = message.subject_hash();
        let verifier = message.verifier();
        let digest = claw_signer::digest(self.domain_for(subject_type), message);

        self.db
            .attestations
            .insert(AttestationEntity {
                fund_id: fund_id.to_string(),
                subject_type,
                subject_hash,
                verifier,
                epoch_id: subject.epoch_id,
                expires_at: message.expires_at(),
                nonce: message.nonce(),
                signature: signature.to_string(),
                digest,
                submitted_by: submitted_by.to_string(),
                created_at: now,
            })
            .await?;

        let attesters = self
            .db
            .attestations
            .list_attesters(fund_id, subject_type, &subject_hash)
            .await?;
        let state = snapshot.evaluate(&attesters)?;
        let stored = self
            .db
            .subjects
            .update_weight(fund_id, subject_type, &subject_hash, state.attested_weight)
            .await?;
        debug!(
            fund_id,
            subject_hash = %subject_hash,
            attested = state.attested_weight,
            threshold = state.threshold_weight,
            "attestation recorded"
        );

        let attested_event = match subject_type {
            SubjectType::Claim => EventType::ClaimAttested,
            SubjectType::Intent => EventType::IntentAttested,
        };
        self.outbox
            .announce(
                attested_event,
                fund_id,
                json!({
                    "subjectHash": subject_hash,
                    "verifier": verifier,
                    "epochId": subject.epoch_id,
                    "attestedWeight": state.attested_weight.to_string(),
                    "thresholdWeight": state.threshold_weight.to_string(),
                    "attesterCount": attesters.len(),
                }),
            )
            .await;

        let mut receipt = AttestationReceipt {
            fund_id: fund_id.to_string(),
            subject_type: subject_type.as_str().to_string(),
            subject_hash,
            verifier,
            digest,
            attested_weight: state.attested_weight.to_string(),
            threshold_weight: state.threshold_weight.to_string(),
            total_weight: state.total_weight.to_string(),
            status: stored.status,
            newly_approved: false,
            job_id: None,
            snapshot_hash: None,
        };

        if !state.met {
            return Ok(receipt);
        }
        receipt.status = SubjectStatus::Approved;
        if !self
            .db
            .subjects
            .mark_approved(fund_id, subject_type, &subject_hash, now)
            .await?
        {
            return Ok(receipt);
        }

        receipt.newly_approved = true;
        counter!("claw_quorum_reached_total", "subject" => subject_type.label()).increment(1);
        info!(
            fund_id,
            subject_type = subject_type.as_str(),
            subject_hash = %subject_hash,
            attested = state.attested_weight,
            threshold = state.threshold_weight,
            "quorum reached"
        );

        match subject_type {
            SubjectType::Intent => {
                receipt.job_id = Some(self.enqueue_execution(fund_id, &stored, now).await?);
            }
            SubjectType::Claim => {
                let epoch_id = subject.epoch_id.unwrap_or_default();
                receipt.snapshot_hash = Some(self.finalize_snapshot(fund_id, epoch_id, now).await?);
            }
        }
        Ok(receipt)
    }

    async fn enqueue_execution(
        &self,
        fund_id: &str,
        subject: &SubjectEntity,
        now: DateTime<Utc>,
    ) -> ApiResult<String> {
        let payload = subject
            .payload
            .clone()
            .ok_or_else(|| ApiError::internal(format!("intent {} has no proposal", subject.key())))?;
        let proposal: IntentProposal = serde_json::from_value(payload)
            .map_err(|e| ApiError::internal(format!("intent {} proposal: {e}", subject.key())))?;

        let job = self
            .scheduler
            .enqueue(
                fund_id,
                subject.subject_hash,
                proposal.intent,
                proposal.execution_route,
                proposal.max_notional,
                now,
            )
            .await?;

        self.outbox
            .announce(
                EventType::IntentReady,
                fund_id,
                json!({
                    "intentHash": subject.subject_hash,
                    "jobId": job.job_id,
                    "deadline": job.deadline,
                }),
            )
            .await;
        Ok(job.job_id)
    }

    /// Recompute the epoch commitment over every approved claim
    async fn finalize_snapshot(&self, fund_id: &str, epoch_id: u64, now: DateTime<Utc>) -> ApiResult<B256> {
        let view = self.compute_snapshot(fund_id, epoch_id).await?;
        self.db
            .epochs
            .record_snapshot(
                fund_id,
                epoch_id,
                view.snapshot_hash,
                view.epoch_state_hash,
                view.claim_count,
                now,
            )
            .await?;

        self.outbox
            .announce(
                EventType::SnapshotFinalized,
                fund_id,
                json!({
                    "epochId": epoch_id,
                    "snapshotHash": view.snapshot_hash,
                    "merkleRoot": view.merkle_root,
                    "epochStateHash": view.epoch_state_hash,
                    "claimCount": view.claim_count,
                }),
            )
            .await;
        info!(fund_id, epoch_id, snapshot_hash = %view.snapshot_hash, claims = view.claim_count, "snapshot finalized");
        Ok(view.snapshot_hash)
    }

    // ============================================
    // Epochs
    // ============================================

    /// Snapshot view of an epoch's approved claims
    pub async fn epoch_snapshot(&self, fund_id: &str, epoch_id: u64) -> ApiResult<EpochSnapshotResponse> {
        let mut view = self.compute_snapshot(fund_id, epoch_id).await?;
        view.finalized_at = self
            .db
            .epochs
            .get(fund_id, epoch_id)
            .await?
            .and_then(|e| e.finalized_at);
        Ok(view)
    }

    async fn compute_snapshot(&self, fund_id: &str, epoch_id: u64) -> ApiResult<EpochSnapshotResponse> {
        let approved = self.db.subjects.list_approved_claims(fund_id, epoch_id).await?;
        if approved.is_empty() {
            return Err(ApiError::not_found(
                "EpochSnapshot",
                format!("{fund_id}:{epoch_id}"),
            ));
        }
        let claim_hashes = unique_sorted(&approved);
        Ok(EpochSnapshotResponse {
            fund_id: fund_id.to_string(),
            epoch_id,
            snapshot_hash: snapshot_hash(epoch_id, &claim_hashes)?,
            merkle_root: merkle_root(&claim_hashes)?,
            epoch_state_hash: epoch_state_hash(epoch_id, &claim_hashes)?,
            claim_count: claim_hashes.len(),
            claim_hashes,
            finalized_at: None,
        })
    }

    async fn open_epoch(&self, fund_id: &str, epoch_id: u64, now: DateTime<Utc>) -> ApiResult<bool> {
        let opened = self.db.epochs.open_if_absent(fund_id, epoch_id, now).await?;
        if opened {
            self.outbox
                .announce(EventType::EpochOpened, fund_id, json!({ "epochId": epoch_id }))
                .await;
        }
        Ok(opened)
    }

    fn domain_for(&self, subject_type: SubjectType) -> &AttestationDomain {
        match subject_type {
            SubjectType::Claim => &self.claim_domain,
            SubjectType::Intent => &self.intent_domain,
        }
    }
}

fn unix_secs(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or_default()
}

fn observe(subject_type: SubjectType, fund_id: &str, subject_hash: B256, result: &ApiResult<AttestationReceipt>) {
    let outcome = match result {
        Ok(_) => "accepted",
        Err(err) => {
            warn!(
                fund_id,
                subject_type = subject_type.as_str(),
                subject_hash = %subject_hash,
                error = %err,
                "attestation rejected"
            );
            "rejected"
        }
    };
    counter!("claw_attestations_total", "subject" => subject_type.label(), "outcome" => outcome)
        .increment(1);
}
