//! Data Transfer Objects
//!
//! Request and response bodies of the relayer API. Field names are camelCase
//! on the wire; large integers travel as decimal strings.

use chrono::{DateTime, Utc};
use claw_core::{serde_u256, serde_u64, Address, ClaimPayload, ExecutionRoute, TradeIntent, B256, U256};
use claw_executor::TickReport;
use claw_signer::{ClaimAttestationMessage, IntentAttestationMessage};
use claw_store::{BotRole, ExecutionJobEntity, MembershipStatus, SubjectStatus};
use serde::{Deserialize, Serialize};

use crate::error::ErrorResponse;

// ============================================
// Funds and bots
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapFundRequest {
    pub fund_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapFundResponse {
    pub fund_id: String,
    pub strategy_bot_id: String,
    pub strategy_bot_address: Address,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBotRequest {
    pub bot_id: String,
    pub role: BotRole,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBotResponse {
    pub fund_id: String,
    pub bot_id: String,
    pub role: BotRole,
    pub address: Address,
    pub status: MembershipStatus,
}

// ============================================
// Claims and intents
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitClaimRequest {
    #[serde(with = "serde_u64")]
    pub epoch_id: u64,
    pub claim: ClaimPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitClaimResponse {
    pub fund_id: String,
    pub epoch_id: u64,
    pub claim_hash: B256,
    pub status: SubjectStatus,
    pub threshold_weight: String,
    pub epoch_opened: bool,
}

/// Intent proposal; also stored as the intent subject's payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentProposal {
    pub intent: TradeIntent,
    pub execution_route: ExecutionRoute,
    #[serde(with = "serde_u256")]
    pub max_notional: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeIntentResponse {
    pub fund_id: String,
    pub intent_hash: B256,
    pub allowlist_hash: B256,
    pub status: SubjectStatus,
    pub threshold_weight: String,
}

// ============================================
// Attestations
// ============================================

/// Attestation message plus its signature, flat on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAttestation<M> {
    #[serde(flatten)]
    pub message: M,
    pub signature: String,
}

pub type ClaimAttestationRequest = SignedAttestation<ClaimAttestationMessage>;
pub type IntentAttestationItem = SignedAttestation<IntentAttestationMessage>;

/// Either `{attestations: [...]}` or one bare attestation
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IntentAttestationBatchRequest {
    Batch { attestations: Vec<IntentAttestationItem> },
    Single(IntentAttestationItem),
}

impl IntentAttestationBatchRequest {
    pub fn into_items(self) -> Vec<IntentAttestationItem> {
        match self {
            IntentAttestationBatchRequest::Batch { attestations } => attestations,
            IntentAttestationBatchRequest::Single(item) => vec![item],
        }
    }
}

/// Outcome of one accepted attestation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReceipt {
    pub fund_id: String,
    pub subject_type: String,
    pub subject_hash: B256,
    pub verifier: Address,
    pub digest: B256,
    pub attested_weight: String,
    pub threshold_weight: String,
    pub total_weight: String,
    pub status: SubjectStatus,
    /// True only for the attestation that crossed the threshold
    pub newly_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_hash: Option<B256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub index: usize,
    pub ok: bool,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<AttestationReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAttestationResponse {
    /// `OK` when every item was accepted, `PARTIAL` otherwise
    pub status: String,
    pub accepted: usize,
    pub rejected: usize,
    pub results: Vec<BatchItemResult>,
}

// ============================================
// Epochs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochSnapshotResponse {
    pub fund_id: String,
    pub epoch_id: u64,
    /// Strictly ascending
    pub claim_hashes: Vec<B256>,
    pub claim_count: usize,
    pub snapshot_hash: B256,
    pub merkle_root: B256,
    pub epoch_state_hash: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

// ============================================
// Execution
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionJobsResponse {
    pub fund_id: String,
    pub jobs: Vec<ExecutionJobEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainExecutedRequest {
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainFailedRequest {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_delay_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionJobResponse {
    pub fund_id: String,
    pub job: ExecutionJobEntity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronTickResponse {
    #[serde(flatten)]
    pub report: TickReport,
    pub pruned_nonces: usize,
}

// ============================================
// Events
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStreamQuery {
    pub fund_id: Option<String>,
    /// Comma separated event types
    pub types: Option<String>,
}

// ============================================
// Health
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub request_count: u64,
    pub components: Vec<ComponentHealth>,
    pub counts: RelayerCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerCounts {
    pub bots: usize,
    pub funds: usize,
    pub subjects: usize,
    pub attestations: usize,
    pub jobs_ready: usize,
    pub jobs_failed_final: usize,
    pub last_event_id: u64,
    pub event_subscribers: usize,
}
