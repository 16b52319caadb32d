//! API Handlers
//!
//! Every bot endpoint authenticates first, then checks fund membership, then
//! hands off to the gateway, scheduler or store.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use claw_core::canon::normalize_text;
use claw_core::parse_bytes32;
use claw_store::{BotRole, FundBotMembership, FundEntity, MembershipStatus, SubjectStatus};
use std::sync::Arc;

use crate::auth::BotScope;
use crate::dto::*;
use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::{AppState, ComponentHealthCheck, HealthStatus};

pub const HEADER_CRON_SECRET: &str = "x-cron-secret";

const DEFAULT_FAILURE_REASON: &str = "unknown strategy execution failure";
const DEFAULT_RETRY_DELAY_MS: i64 = 30_000;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

fn fund_path(raw: &str) -> ApiResult<String> {
    let fund_id = normalize_text(raw);
    if fund_id.is_empty() {
        return Err(ApiError::validation("fundId is required"));
    }
    Ok(fund_id)
}

/// 200 once the subject is approved, 202 while it is pending
fn attestation_status(status: SubjectStatus) -> StatusCode {
    match status {
        SubjectStatus::Approved => StatusCode::OK,
        SubjectStatus::Pending => StatusCode::ACCEPTED,
    }
}

// ============================================
// Health
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut components = Vec::new();

    let counts = match state.counts().await {
        Ok(counts) => {
            components.push(ComponentHealthCheck::healthy("store"));
            counts
        }
        Err(err) => {
            components.push(ComponentHealthCheck::unhealthy("store", err.to_string()));
            RelayerCounts::default()
        }
    };

    components.push(if state.scheduler.has_chain_client() {
        ComponentHealthCheck::healthy("executor")
    } else {
        ComponentHealthCheck::degraded("executor", "no chain client; execution via callbacks")
    });
    components.push(ComponentHealthCheck::healthy("outbox"));

    let overall_status = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    };

    Ok(Json(HealthResponse {
        status: overall_status.as_str().to_string(),
        version: state.config.version.clone(),
        uptime_secs: state.uptime_secs(),
        request_count: state.request_count().await,
        components: components
            .into_iter()
            .map(|c| ComponentHealth {
                name: c.name,
                status: c.status.as_str().to_string(),
                message: c.message,
            })
            .collect(),
        counts,
    }))
}

// ============================================
// Funds and bots
// ============================================

/// Create a fund and make the caller its strategy bot
pub async fn bootstrap_fund(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<BootstrapFundRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BootstrapFundResponse>)> {
    let now = Utc::now();
    let bot = state.auth.authenticate(&headers, &[], now).await?;
    let request = body(payload)?;
    let fund_id = fund_path(&request.fund_id)?;

    let fund = state
        .db
        .funds
        .create(FundEntity {
            fund_id: fund_id.clone(),
            strategy_bot_id: bot.bot_id.clone(),
            created_at: now,
        })
        .await?;
    state
        .db
        .bots
        .upsert_role(&bot.bot_id, bot.address, BotRole::Strategy, now)
        .await?;
    state
        .db
        .memberships
        .add(FundBotMembership {
            fund_id: fund_id.clone(),
            bot_id: bot.bot_id.clone(),
            role: BotRole::Strategy,
            address: bot.address,
            status: MembershipStatus::Active,
            created_at: now,
        })
        .await?;
    tracing::info!(fund_id = %fund_id, bot_id = %bot.bot_id, "fund bootstrapped");

    Ok((
        StatusCode::CREATED,
        Json(BootstrapFundResponse {
            fund_id,
            strategy_bot_id: bot.bot_id,
            strategy_bot_address: bot.address,
            created_at: fund.created_at,
        }),
    ))
}

/// Register a bot in a fund
pub async fn register_bot(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<RegisterBotRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterBotResponse>)> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let caller = state
        .auth
        .authenticate(&headers, &[BotScope::BotsRegister], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &caller, &[BotRole::Strategy])
        .await?;

    let request = body(payload)?;
    let bot_id = normalize_text(&request.bot_id);
    if bot_id.is_empty() {
        return Err(ApiError::validation("botId is required"));
    }

    state
        .db
        .bots
        .upsert_role(&bot_id, request.address, request.role, now)
        .await?;
    let membership = state
        .db
        .memberships
        .add(FundBotMembership {
            fund_id: fund_id.clone(),
            bot_id: bot_id.clone(),
            role: request.role,
            address: request.address,
            status: MembershipStatus::Active,
            created_at: now,
        })
        .await?;
    tracing::info!(
        fund_id = %fund_id,
        bot_id = %bot_id,
        role = %request.role,
        registered_by = %caller.bot_id,
        "bot registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterBotResponse {
            fund_id,
            bot_id,
            role: membership.role,
            address: membership.address,
            status: membership.status,
        }),
    ))
}

// ============================================
// Claims and intents
// ============================================

pub async fn submit_claim(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<SubmitClaimRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitClaimResponse>)> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::ClaimsSubmit], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Participant])
        .await?;
    let request = body(payload)?;

    let response = state
        .attestations
        .submit_claim(&fund_id, request.epoch_id, request.claim, &bot.bot_id, now)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn propose_intent(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<IntentProposal>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProposeIntentResponse>)> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::IntentsPropose], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Strategy])
        .await?;
    let proposal = body(payload)?;

    let response = state
        .attestations
        .propose_intent(&fund_id, proposal, &bot.bot_id, now)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ============================================
// Attestations
// ============================================

pub async fn attest_claim(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ClaimAttestationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AttestationReceipt>)> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::ClaimsAttest], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Participant])
        .await?;
    let attestation = body(payload)?;

    let receipt = state
        .attestations
        .attest_claim(&fund_id, &attestation, &bot.bot_id, now)
        .await?;
    Ok((attestation_status(receipt.status), Json(receipt)))
}

/// Items are processed in order; one failing item does not stop the rest
pub async fn attest_intents_batch(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<IntentAttestationBatchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BatchAttestationResponse>)> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::IntentsAttest], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Participant])
        .await?;
    let items = body(payload)?.into_items();
    if items.is_empty() {
        return Err(ApiError::validation("attestations must not be empty"));
    }

    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let intent_hash = Some(item.message.intent_hash);
        let result = match state
            .attestations
            .attest_intent(&fund_id, item, &bot.bot_id, now)
            .await
        {
            Ok(receipt) => BatchItemResult {
                index,
                ok: true,
                status_code: attestation_status(receipt.status).as_u16(),
                intent_hash,
                receipt: Some(receipt),
                error: None,
            },
            Err(err) => BatchItemResult {
                index,
                ok: false,
                status_code: err.status_code().as_u16(),
                intent_hash,
                receipt: None,
                error: Some(ErrorResponse::from(&err)),
            },
        };
        results.push(result);
    }

    let accepted = results.iter().filter(|r| r.ok).count();
    let rejected = results.len() - accepted;
    let (status_code, status) = if rejected == 0 {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::MULTI_STATUS, "PARTIAL")
    };

    Ok((
        status_code,
        Json(BatchAttestationResponse {
            status: status.to_string(),
            accepted,
            rejected,
            results,
        }),
    ))
}

// ============================================
// Epochs
// ============================================

pub async fn get_epoch_snapshot(
    State(state): State<Arc<AppState>>,
    Path((fund_id, epoch_id)): Path<(String, String)>,
) -> ApiResult<Json<EpochSnapshotResponse>> {
    let fund_id = fund_path(&fund_id)?;
    let epoch_id = epoch_id
        .trim()
        .parse::<u64>()
        .map_err(|_| ApiError::validation(format!("invalid epochId: {epoch_id}")))?;

    let snapshot = state.attestations.epoch_snapshot(&fund_id, epoch_id).await?;
    Ok(Json(snapshot))
}

// ============================================
// Execution
// ============================================

pub async fn list_execution_jobs(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ExecutionJobsResponse>> {
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::IntentsPropose], Utc::now())
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Strategy])
        .await?;

    let jobs = state.scheduler.list(&fund_id).await?;
    Ok(Json(ExecutionJobsResponse { fund_id, jobs }))
}

pub async fn onchain_executed(
    State(state): State<Arc<AppState>>,
    Path((fund_id, intent_hash)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<OnchainExecutedRequest>, JsonRejection>,
) -> ApiResult<Json<ExecutionJobResponse>> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::IntentsPropose], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Strategy])
        .await?;
    let intent_hash = parse_bytes32("intentHash", &intent_hash)?;
    let request = body(payload)?;
    let tx_hash = request
        .tx_hash
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::validation("txHash is required"))?;
    let tx_hash = parse_bytes32("txHash", tx_hash)?;

    let job = state
        .scheduler
        .mark_executed(&fund_id, &intent_hash, tx_hash, now)
        .await?;
    state.publish_job(&job).await;
    Ok(Json(ExecutionJobResponse { fund_id, job }))
}

/// Body is optional; missing fields fall back to the default reason and delay
pub async fn onchain_failed(
    State(state): State<Arc<AppState>>,
    Path((fund_id, intent_hash)): Path<(String, String)>,
    headers: HeaderMap,
    raw: Bytes,
) -> ApiResult<Json<ExecutionJobResponse>> {
    let now = Utc::now();
    let fund_id = fund_path(&fund_id)?;
    let bot = state
        .auth
        .authenticate(&headers, &[BotScope::IntentsPropose], now)
        .await?;
    state
        .auth
        .require_fund_role(&fund_id, &bot, &[BotRole::Strategy])
        .await?;
    let intent_hash = parse_bytes32("intentHash", &intent_hash)?;

    let request: OnchainFailedRequest = if raw.iter().all(u8::is_ascii_whitespace) {
        OnchainFailedRequest::default()
    } else {
        serde_json::from_slice(&raw)
            .map_err(|e| ApiError::validation(format!("invalid request body: {e}")))?
    };
    let reason = request
        .error
        .as_deref()
        .map(normalize_text)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
    let delay_ms = request.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS);
    if delay_ms < 0 {
        return Err(ApiError::validation("retryDelayMs must be non-negative"));
    }

    let job = state
        .scheduler
        .mark_failed(
            &fund_id,
            &intent_hash,
            &reason,
            chrono::Duration::milliseconds(delay_ms),
            now,
        )
        .await?;
    state.publish_job(&job).await;
    Ok(Json(ExecutionJobResponse { fund_id, job }))
}

/// One scheduler pass, guarded by the shared cron secret
pub async fn cron_execution_tick(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<CronTickResponse>> {
    let Some(expected) = state.relayer.cron_secret.as_deref() else {
        return Err(ApiError::unauthorized("cron tick is not configured"));
    };
    let provided = headers
        .get(HEADER_CRON_SECRET)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        tracing::warn!("cron tick rejected: bad secret");
        return Err(ApiError::unauthorized("invalid cron secret"));
    }

    let response = state.execution_tick(Utc::now()).await?;
    Ok(Json(response))
}
