//! Prometheus Metrics
//!
//! # Metrics
//!
//! ## Counters
//! - `claw_http_requests_total` - HTTP requests by method, path, status
//! - `claw_attestations_total` - attestations by subject and outcome
//! - `claw_quorum_reached_total` - subjects approved, by subject
//! - `claw_execution_jobs_total` - job transitions by outcome
//! - `claw_outbox_events_total` - published events by type
//!
//! ## Histograms
//! - `claw_http_request_duration_seconds` - HTTP request duration
//!
//! ## Gauges
//! - `claw_uptime_seconds` - service uptime
//!
//! # Configuration
//!
//! - `CLAW_METRICS_ENABLED`: enable the exporter (default: true)
//! - `CLAW_METRICS_PORT`: exporter listen port (default: 9090)

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

impl MetricsConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("CLAW_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let port = std::env::var("CLAW_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090);

        Self { enabled, port }
    }
}

/// Install the Prometheus exporter. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), String> {
    if !config.enabled {
        tracing::info!("Metrics disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .install()
        .map_err(|e| format!("Failed to install metrics recorder: {}", e))?;

    tracing::info!(port = config.port, "Metrics initialized");
    Ok(())
}

pub fn record_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", normalize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("claw_http_requests_total", &labels).increment(1);
    histogram!("claw_http_request_duration_seconds", &labels).record(duration_secs);
}

/// Collapse ids and hashes so label cardinality stays bounded
fn normalize_path(path: &str) -> String {
    let mut segments = path.split('/').peekable();
    let mut normalized = Vec::new();
    let mut previous = "";
    while let Some(part) = segments.next() {
        let replaced = match previous {
            "funds" if part != "bootstrap" => ":fund_id",
            "intents" if segments.peek().is_some() && part.starts_with("0x") => ":intent_hash",
            "epochs" => ":epoch_id",
            _ => part,
        };
        normalized.push(replaced);
        previous = part;
    }
    normalized.join("/")
}

/// Count and time every request
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    state.increment_requests().await;
    gauge!("claw_uptime_seconds").set(state.uptime_secs() as f64);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    record_request(&method, &path, status, start.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/funds/bootstrap"), "/api/v1/funds/bootstrap");
        assert_eq!(
            normalize_path("/api/v1/funds/alpha/claims"),
            "/api/v1/funds/:fund_id/claims"
        );
        assert_eq!(
            normalize_path("/api/v1/funds/alpha/epochs/12/snapshot"),
            "/api/v1/funds/:fund_id/epochs/:epoch_id/snapshot"
        );
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(
            normalize_path(&format!("/api/v1/funds/alpha/intents/{hash}/onchain-executed")),
            "/api/v1/funds/:fund_id/intents/:intent_hash/onchain-executed"
        );
        assert_eq!(
            normalize_path("/api/v1/funds/alpha/intents/propose"),
            "/api/v1/funds/:fund_id/intents/propose"
        );
    }
}
