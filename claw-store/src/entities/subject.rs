//! Attestation subjects, attestations and epochs

use chrono::{DateTime, Utc};
use claw_core::{Address, SubjectType, B256, U256};
use serde::{Deserialize, Serialize};

/// Quorum status of a subject
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectStatus {
    Pending,
    Approved,
}

/// Claim or intent collecting attestations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectEntity {
    pub fund_id: String,
    pub subject_type: SubjectType,
    pub subject_hash: B256,
    /// Set for claims
    pub epoch_id: Option<u64>,
    pub status: SubjectStatus,
    pub attested_weight: u128,
    pub threshold_weight: u128,
    /// Submitted claim, or proposed intent with its route
    pub payload: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl SubjectEntity {
    pub fn pending(
        fund_id: impl Into<String>,
        subject_type: SubjectType,
        subject_hash: B256,
        epoch_id: Option<u64>,
        threshold_weight: u128,
    ) -> Self {
        Self {
            fund_id: fund_id.into(),
            subject_type,
            subject_hash,
            epoch_id,
            status: SubjectStatus::Pending,
            attested_weight: 0,
            threshold_weight,
            payload: None,
            created_by: None,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value, created_by: impl Into<String>) -> Self {
        self.payload = Some(payload);
        self.created_by = Some(created_by.into());
        self
    }

    pub fn is_approved(&self) -> bool {
        self.status == SubjectStatus::Approved
    }

    /// Identifier used in logs and not-found errors
    pub fn key(&self) -> String {
        subject_key(&self.fund_id, self.subject_type, &self.subject_hash)
    }
}

pub fn subject_key(fund_id: &str, subject_type: SubjectType, subject_hash: &B256) -> String {
    format!("{fund_id}:{subject_type}:{subject_hash}")
}

/// Accepted attestation. Never mutated after insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationEntity {
    pub fund_id: String,
    pub subject_type: SubjectType,
    pub subject_hash: B256,
    pub verifier: Address,
    pub epoch_id: Option<u64>,
    pub expires_at: u64,
    pub nonce: U256,
    pub signature: String,
    pub digest: B256,
    pub submitted_by: String,
    pub created_at: DateTime<Utc>,
}

/// Epoch of a fund, opened by its first claim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochEntity {
    pub fund_id: String,
    pub epoch_id: u64,
    pub opened_at: DateTime<Utc>,
    pub snapshot_hash: Option<B256>,
    pub epoch_state_hash: Option<B256>,
    pub claim_count: usize,
    pub finalized_at: Option<DateTime<Utc>>,
}
