//! Claw API - relayer HTTP surface
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                    claw-api                      │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │  routes ── BotAuthGateway (sig, nonce,     │  │
//! │  │            scope, fund membership)         │  │
//! │  └────────────────────────────────────────────┘  │
//! │         │                 │               │      │
//! │         ▼                 ▼               ▼      │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────┐  │
//! │  │ Attestation │  │  Execution   │  │  Event  │  │
//! │  │  Gateway    │─▶│  Scheduler   │  │ Outbox  │──┼─▶ SSE
//! │  └─────────────┘  └──────────────┘  └─────────┘  │
//! └──────────────────────────────────────────────────┘
//!         │                 │               │
//!         ▼                 ▼               ▼
//!    claw-signer      claw-executor     claw-store
//! ```
//!
//! # Endpoints (under `/api/v1`)
//!
//! ## Funds and bots
//! - `POST /funds/bootstrap`
//! - `POST /funds/:fund_id/bots/register`
//!
//! ## Claims
//! - `POST /funds/:fund_id/claims`
//! - `POST /funds/:fund_id/attestations`
//! - `GET /funds/:fund_id/epochs/:epoch_id/snapshot`
//!
//! ## Intents and execution
//! - `POST /funds/:fund_id/intents/propose`
//! - `POST /funds/:fund_id/intents/attestations/batch`
//! - `GET /funds/:fund_id/execution-jobs`
//! - `POST /funds/:fund_id/intents/:intent_hash/onchain-executed`
//! - `POST /funds/:fund_id/intents/:intent_hash/onchain-failed`
//! - `POST /cron/execution-tick`
//!
//! ## Events
//! - `GET /events/stream`
//! - `GET /funds/:fund_id/events/intents`
//!
//! # Usage Example
//!
//! ```ignore
//! use claw_api::{start_server, ApiConfig, AppState, RelayerConfig};
//! use claw_store::RelayerDatabase;
//!
//! let relayer = RelayerConfig::from_env()?;
//! let state = AppState::new(ApiConfig::default(), relayer, RelayerDatabase::in_memory());
//! start_server(state).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod outbox;
pub mod routes;
pub mod sse;
pub mod state;

pub use auth::{AuthenticatedBot, BotAuthGateway, BotScope};
pub use config::{ConfigError, QuorumPolicy, RelayerConfig};
pub use dto::*;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use gateway::AttestationGateway;
pub use metrics::{init_metrics, MetricsConfig};
pub use outbox::{EventOutbox, OutboxSubscription};
pub use routes::{build_app, create_router, create_v1_router};
pub use state::{ApiConfig, AppState, ComponentHealthCheck, HealthStatus};

use std::sync::Arc;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8080;

/// Serve until the listener fails. Starts the background execution loop
/// when `EXECUTION_TICK_SECS` is non-zero.
pub async fn start_server(state: AppState) -> Result<(), std::io::Error> {
    let addr = state.config.listen_addr.clone();
    let tick_secs = state.relayer.execution.tick_secs;
    let state = Arc::new(state);

    let ticker = (tick_secs > 0).then(|| {
        tracing::info!(tick_secs, "Starting execution tick loop");
        let outcomes = state.clone();
        state.scheduler.clone().spawn_tick_loop(
            std::time::Duration::from_secs(tick_secs),
            move |report, now| {
                let state = outcomes.clone();
                async move {
                    if let Err(err) = state.finish_tick(&report, now).await {
                        tracing::warn!(error = %err, "tick housekeeping failed");
                    }
                }
            },
        )
    });

    let app = build_app(state);
    tracing::info!("Starting claw relayer on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app).await;
    if let Some(handle) = ticker {
        handle.abort();
    }
    served
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_port_matches_config() {
        assert!(ApiConfig::default().listen_addr.ends_with(&DEFAULT_PORT.to_string()));
    }
}
