//! API Routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::metrics::metrics_middleware;
use crate::sse::{event_stream, fund_intent_stream};
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let enable_cors = state.config.enable_cors;

    let mut router = Router::new()
        .route("/health", get(health_check))
        // Funds and bots
        .route("/funds/bootstrap", post(bootstrap_fund))
        .route("/funds/:fund_id/bots/register", post(register_bot))
        // Claims
        .route("/funds/:fund_id/claims", post(submit_claim))
        .route("/funds/:fund_id/attestations", post(attest_claim))
        .route("/funds/:fund_id/epochs/:epoch_id/snapshot", get(get_epoch_snapshot))
        // Intents
        .route("/funds/:fund_id/intents/propose", post(propose_intent))
        .route(
            "/funds/:fund_id/intents/attestations/batch",
            post(attest_intents_batch),
        )
        // Execution
        .route("/funds/:fund_id/execution-jobs", get(list_execution_jobs))
        .route(
            "/funds/:fund_id/intents/:intent_hash/onchain-executed",
            post(onchain_executed),
        )
        .route(
            "/funds/:fund_id/intents/:intent_hash/onchain-failed",
            post(onchain_failed),
        )
        .route("/cron/execution-tick", post(cron_execution_tick))
        // Events
        .route("/events/stream", get(event_stream))
        .route("/funds/:fund_id/events/intents", get(fund_intent_stream))
        .with_state(state.clone());

    router = router.layer(middleware::from_fn_with_state(state, metrics_middleware));

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.layer(TraceLayer::new_for_http())
}

/// Router for the V1 API under /api/v1
pub fn create_v1_router(state: Arc<AppState>) -> Router {
    Router::new().nest("/api/v1", create_router(state))
}

/// Build the full application router
pub fn build_app(state: Arc<AppState>) -> Router {
    let root_router = Router::new().route("/", get(|| async { "claw relayer" }));

    let health_router = Router::new()
        .route("/healthz", get(health_check))
        .with_state(state.clone());

    root_router
        .merge(health_router)
        .merge(create_v1_router(state))
}
