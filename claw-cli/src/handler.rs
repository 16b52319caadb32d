//! Command Handlers

use claw_api::{init_metrics, start_server, ApiConfig, AppState, ConfigError, MetricsConfig, RelayerConfig};
use claw_core::{ClaimPayload, ExecutionRoute, TradeIntent, B256};
use claw_executor::MockChainClient;
use claw_store::RelayerDatabase;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::commands::{
    config::ConfigCommands,
    hash::{EpochClaims, HashCommands},
    Cli, Commands,
};
use crate::error::{CliError, CliResult};
use crate::output;

/// Result of one hash command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashReport {
    pub kind: &'static str,
    pub hash: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_allowlist_hash: Option<B256>,
}

impl HashReport {
    fn new(kind: &'static str, hash: B256) -> Self {
        Self {
            kind,
            hash,
            epoch_id: None,
            claim_count: None,
            route_allowlist_hash: None,
        }
    }
}

/// What `config check` prints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub chain_id: u64,
    pub claim_book_address: String,
    pub intent_book_address: String,
    pub validator_count: usize,
    pub total_weight: String,
    pub claim_threshold: String,
    pub intent_threshold: String,
    pub overridden_funds: Vec<String>,
    pub allowlist_size: usize,
    pub execution_max_attempts: u32,
    pub execution_tick_secs: u64,
    pub cron_enabled: bool,
}

pub async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Start {
            listen,
            no_cors,
            mock_chain,
        } => handle_start(listen, !no_cors, mock_chain).await,
        Commands::Hash(cmd) => {
            let report = compute_hash(&cmd)?;
            output::print_hash(&report, cli.format);
            Ok(())
        }
        Commands::Config(ConfigCommands::Check) => {
            let summary = summarize(&RelayerConfig::from_env()?)?;
            output::print_config(&summary, cli.format);
            Ok(())
        }
    }
}

async fn handle_start(listen: String, enable_cors: bool, mock_chain: bool) -> CliResult<()> {
    if listen.trim().is_empty() {
        return Err(CliError::invalid_arg("listen address is empty"));
    }
    let relayer = RelayerConfig::from_env()?;

    init_metrics(&MetricsConfig::from_env()).map_err(CliError::server)?;

    let api_config = ApiConfig {
        listen_addr: listen,
        enable_cors,
        ..ApiConfig::default()
    };
    let db = RelayerDatabase::in_memory();
    let state = if mock_chain {
        tracing::warn!("Using the mock chain client; nothing reaches a real chain");
        AppState::with_chain_client(api_config, relayer, db, Arc::new(MockChainClient::new()))
    } else {
        AppState::new(api_config, relayer, db)
    };

    tracing::info!(
        chain_id = state.relayer.chain_id,
        validators = state.relayer.quorum.weights().len(),
        "Relayer configured"
    );

    start_server(state)
        .await
        .map_err(|e| CliError::server(format!("Server error: {}", e)))
}

/// Compute the hash a command asks for
pub fn compute_hash(cmd: &HashCommands) -> CliResult<HashReport> {
    match cmd {
        HashCommands::Claim { file } => {
            let claim: ClaimPayload = read_json(file)?;
            Ok(HashReport::new("claim", claw_core::claim_hash(&claim)?))
        }
        HashCommands::Intent { file, route } => {
            let intent: TradeIntent = read_json(file)?;
            let mut report = HashReport::new("intent", claw_core::intent_hash(&intent)?);
            if let Some(route) = route {
                let route: ExecutionRoute = read_json(route)?;
                route.ensure_matches(&claw_core::canon::canonical_intent(&intent)?)?;
                report.route_allowlist_hash = Some(claw_core::route_allowlist_hash(&route)?);
            }
            Ok(report)
        }
        HashCommands::Snapshot { file, strict } => {
            let epoch: EpochClaims = read_json(file)?;
            let hash = if *strict {
                claw_core::snapshot_hash(epoch.epoch_id, &epoch.claim_hashes)?
            } else {
                claw_core::snapshot_hash_from_unordered(epoch.epoch_id, &epoch.claim_hashes)?
            };
            Ok(epoch_report("snapshot", hash, &epoch))
        }
        HashCommands::EpochState { file, strict } => {
            let epoch: EpochClaims = read_json(file)?;
            let hash = if *strict {
                if !epoch.claim_hashes.windows(2).all(|w| w[0] < w[1]) {
                    return Err(claw_core::ProtocolError::not_sorted("claimHashes").into());
                }
                claw_core::epoch_state_hash(epoch.epoch_id, &epoch.claim_hashes)?
            } else {
                claw_core::epoch_state_hash_from_unordered(epoch.epoch_id, &epoch.claim_hashes)?
            };
            Ok(epoch_report("epochState", hash, &epoch))
        }
    }
}

fn epoch_report(kind: &'static str, hash: B256, epoch: &EpochClaims) -> HashReport {
    let mut unique = epoch.claim_hashes.clone();
    unique.sort_unstable();
    unique.dedup();
    HashReport {
        epoch_id: Some(epoch.epoch_id),
        claim_count: Some(unique.len()),
        ..HashReport::new(kind, hash)
    }
}

pub fn summarize(config: &RelayerConfig) -> CliResult<ConfigSummary> {
    let weights = config.quorum.weights();
    let total = weights.total_weight().map_err(ConfigError::from)?;
    let defaults = config.quorum.default_thresholds();
    Ok(ConfigSummary {
        chain_id: config.chain_id,
        claim_book_address: config.claim_book_address.to_string(),
        intent_book_address: config.intent_book_address.to_string(),
        validator_count: weights.len(),
        total_weight: total.to_string(),
        claim_threshold: defaults.claim.to_string(),
        intent_threshold: defaults.intent.to_string(),
        overridden_funds: config
            .quorum
            .overridden_funds()
            .into_iter()
            .map(String::from)
            .collect(),
        allowlist_size: config.quorum.allowlist().len(),
        execution_max_attempts: config.execution.max_attempts,
        execution_tick_secs: config.execution.tick_secs,
        cron_enabled: config.cron_secret.is_some(),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let raw = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(value: serde_json::Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    fn intent_json() -> serde_json::Value {
        serde_json::json!({
            "intentVersion": "v1",
            "vault": "0x00000000000000000000000000000000000000a1",
            "action": " buy ",
            "tokenIn": "0x00000000000000000000000000000000000000b1",
            "tokenOut": "0x00000000000000000000000000000000000000b2",
            "amountIn": "1000",
            "minAmountOut": "900",
            "deadline": "1900000000",
            "maxSlippageBps": 50,
            "snapshotHash": format!("0x{}", "5a".repeat(32)),
        })
    }

    fn route_json(min_amount_out: &str) -> serde_json::Value {
        serde_json::json!({
            "tokenIn": "0x00000000000000000000000000000000000000b1",
            "tokenOut": "0x00000000000000000000000000000000000000b2",
            "quoteAmountOut": "950",
            "minAmountOut": min_amount_out,
            "adapter": "0x00000000000000000000000000000000000000ad",
            "adapterData": "0xdead",
        })
    }

    #[test]
    fn test_claim_hash_matches_core() {
        let claim = serde_json::json!({
            "schemaId": "price.v1",
            "sourceType": "HTTP",
            "sourceRef": "https://example.test/a",
            "selector": "$.price",
            "extracted": "42",
            "extractedType": "uint256",
            "timestamp": "1700000000",
            "responseHash": format!("0x{}", "44".repeat(32)),
            "evidenceType": "url",
            "evidenceURI": "ipfs://a",
            "crawler": "0x00000000000000000000000000000000000000c1",
        });
        let expected: ClaimPayload = serde_json::from_value(claim.clone()).unwrap();
        let file = json_file(claim);

        let report = compute_hash(&HashCommands::Claim {
            file: file.path().to_path_buf(),
        })
        .unwrap();
        assert_eq!(report.kind, "claim");
        assert_eq!(report.hash, claw_core::claim_hash(&expected).unwrap());
    }

    #[test]
    fn test_intent_with_route() {
        let intent = json_file(intent_json());
        let route = json_file(route_json("900"));

        let report = compute_hash(&HashCommands::Intent {
            file: intent.path().to_path_buf(),
            route: Some(route.path().to_path_buf()),
        })
        .unwrap();
        assert!(report.route_allowlist_hash.is_some());

        let mismatched = json_file(route_json("1"));
        let err = compute_hash(&HashCommands::Intent {
            file: intent.path().to_path_buf(),
            route: Some(mismatched.path().to_path_buf()),
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 12);
    }

    #[test]
    fn test_snapshot_strict_and_unordered() {
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        let unordered = json_file(serde_json::json!({ "epochId": 7, "claimHashes": [b, a, b] }));

        let report = compute_hash(&HashCommands::Snapshot {
            file: unordered.path().to_path_buf(),
            strict: false,
        })
        .unwrap();
        assert_eq!(report.hash, claw_core::snapshot_hash(7, &[a, b]).unwrap());
        assert_eq!(report.claim_count, Some(2));

        let err = compute_hash(&HashCommands::Snapshot {
            file: unordered.path().to_path_buf(),
            strict: true,
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Protocol(_)));
    }

    #[test]
    fn test_epoch_state_strict_rejects_unsorted() {
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        let sorted = json_file(serde_json::json!({ "epochId": 3, "claimHashes": [a, b] }));
        let unsorted = json_file(serde_json::json!({ "epochId": 3, "claimHashes": [b, a] }));

        let strict = compute_hash(&HashCommands::EpochState {
            file: sorted.path().to_path_buf(),
            strict: true,
        })
        .unwrap();
        let loose = compute_hash(&HashCommands::EpochState {
            file: unsorted.path().to_path_buf(),
            strict: false,
        })
        .unwrap();
        assert_eq!(strict.hash, loose.hash);

        assert!(compute_hash(&HashCommands::EpochState {
            file: unsorted.path().to_path_buf(),
            strict: true,
        })
        .is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = compute_hash(&HashCommands::Claim {
            file: "/nonexistent/claim.json".into(),
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = compute_hash(&HashCommands::Claim {
            file: file.path().to_path_buf(),
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_summarize_config() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CHAIN_ID", "10143"),
            ("CLAIM_BOOK_ADDRESS", "0x00000000000000000000000000000000000c1a10"),
            ("INTENT_BOOK_ADDRESS", "0x00000000000000000000000000000000001a7e17"),
            (
                "VERIFIER_WEIGHT_SNAPSHOT",
                "0x00000000000000000000000000000000000000aa:6,0x00000000000000000000000000000000000000bb:4",
            ),
            ("CLAIM_THRESHOLD_WEIGHT", "6"),
            ("INTENT_THRESHOLD_WEIGHT", "7"),
            ("FUND_THRESHOLD_OVERRIDES", "beta:5:10,alpha:4:9"),
        ]);
        let config = RelayerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        let summary = summarize(&config).unwrap();
        assert_eq!(summary.chain_id, 10143);
        assert_eq!(summary.validator_count, 2);
        assert_eq!(summary.total_weight, "10");
        assert_eq!(summary.claim_threshold, "6");
        assert_eq!(summary.overridden_funds, vec!["alpha", "beta"]);
        assert_eq!(summary.allowlist_size, 0);
        assert!(!summary.cron_enabled);
    }
}
