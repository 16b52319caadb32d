//! Chain client seam for intent execution

use alloy_primitives::keccak256;
use async_trait::async_trait;
use claw_core::{intent_execution_call_hash, Address, Bytes, B256, U256};
use claw_store::ExecutionJobEntity;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::error::{ExecutorError, ExecutorResult};

/// Arguments of the core contract's `executeIntent(intentHash, req)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub intent_hash: B256,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub quote_amount_out: U256,
    pub min_amount_out: U256,
    pub adapter: Address,
    pub adapter_data: Bytes,
}

impl ExecutionRequest {
    pub fn from_job(job: &ExecutionJobEntity) -> Self {
        let route = &job.execution_route;
        Self {
            intent_hash: job.intent_hash,
            token_in: route.token_in,
            token_out: route.token_out,
            amount_in: job.intent.amount_in,
            quote_amount_out: route.quote_amount_out,
            min_amount_out: route.min_amount_out,
            adapter: route.adapter,
            adapter_data: route.adapter_data.clone().unwrap_or_default(),
        }
    }

    /// Allowlist hash the contract recomputes from this request's calldata
    pub fn call_hash(&self) -> B256 {
        intent_execution_call_hash(
            self.token_in,
            self.token_out,
            self.quote_amount_out,
            self.min_amount_out,
            self.adapter,
            &self.adapter_data,
        )
    }
}

/// Outcome of waiting for a receipt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Access to the chain the vault lives on. Implementations bound every call
/// with their own RPC timeout.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read-only validation of the request; `Err(Preflight)` on rejection
    async fn preflight(&self, request: &ExecutionRequest) -> ExecutorResult<()>;

    /// Pending nonce of the relayer's sending account
    async fn pending_nonce(&self) -> ExecutorResult<u64>;

    async fn submit(&self, request: &ExecutionRequest, nonce: u64) -> ExecutorResult<B256>;

    async fn wait_for_receipt(&self, tx_hash: B256) -> ExecutorResult<ReceiptStatus>;
}

/// Scripted result for one submission through [`MockChainClient`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockOutcome {
    Confirmed,
    Reverted,
    PreflightRejected(String),
    SubmitError(String),
}

/// Chain client that replays scripted outcomes; unscripted submissions confirm
#[derive(Default)]
pub struct MockChainClient {
    script: Mutex<VecDeque<MockOutcome>>,
    current: Mutex<Option<MockOutcome>>,
    submitted: Mutex<Vec<(ExecutionRequest, u64)>>,
    nonce: AtomicU64,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    pub async fn push(&self, outcome: MockOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    /// Requests that reached `submit`, with the nonce used
    pub async fn submitted(&self) -> Vec<(ExecutionRequest, u64)> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn preflight(&self, _request: &ExecutionRequest) -> ExecutorResult<()> {
        let outcome = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(MockOutcome::Confirmed);
        let result = match &outcome {
            MockOutcome::PreflightRejected(reason) => Err(ExecutorError::Preflight(reason.clone())),
            _ => Ok(()),
        };
        *self.current.lock().await = Some(outcome);
        result
    }

    async fn pending_nonce(&self) -> ExecutorResult<u64> {
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn submit(&self, request: &ExecutionRequest, nonce: u64) -> ExecutorResult<B256> {
        if let Some(MockOutcome::SubmitError(message)) = self.current.lock().await.as_ref() {
            return Err(ExecutorError::chain(message.clone()));
        }
        self.nonce.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().await.push((request.clone(), nonce));

        let mut seed = request.intent_hash.to_vec();
        seed.extend_from_slice(&nonce.to_be_bytes());
        Ok(keccak256(seed))
    }

    async fn wait_for_receipt(&self, _tx_hash: B256) -> ExecutorResult<ReceiptStatus> {
        match self.current.lock().await.take() {
            Some(MockOutcome::Reverted) => Ok(ReceiptStatus::Reverted),
            _ => Ok(ReceiptStatus::Success),
        }
    }
}
