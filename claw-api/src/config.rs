//! Relayer runtime configuration
//!
//! Read from environment-style key/value pairs. Validator snapshots are built
//! here so that an unreachable threshold, a duplicate validator or a
//! non-positive weight fails at load time instead of on the first attestation.

use claw_core::{parse_address, Address};
use claw_signer::{
    AttestationDomain, SignerError, ValidatorSnapshot, ValidatorWeight, ValidatorWeightMap,
};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Configuration load failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(&'static str),

    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("invalid validator snapshot: {0}")]
    Snapshot(#[from] SignerError),
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

/// Claim and intent thresholds of one fund
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FundThresholds {
    pub claim: u128,
    pub intent: u128,
}

/// Execution scheduler settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionSettings {
    pub max_attempts: u32,
    pub batch_limit: usize,
    pub retry_base_secs: i64,
    /// 0 disables the background tick loop
    pub tick_secs: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            batch_limit: 5,
            retry_base_secs: 10,
            tick_secs: 0,
        }
    }
}

/// Outbox buffer sizes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboxSettings {
    pub history_limit: usize,
    pub replay_limit: usize,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            history_limit: 100,
            replay_limit: 500,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RelayerConfig {
    pub chain_id: u64,
    pub claim_book_address: Address,
    pub intent_book_address: Address,
    pub quorum: QuorumPolicy,
    pub execution: ExecutionSettings,
    pub cron_secret: Option<String>,
    pub outbox: OutboxSettings,
}

impl RelayerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let chain_id = parse_number(required("CHAIN_ID")?, "CHAIN_ID")?;
        let claim_book_address = parse_env_address(&required("CLAIM_BOOK_ADDRESS")?, "CLAIM_BOOK_ADDRESS")?;
        let intent_book_address =
            parse_env_address(&required("INTENT_BOOK_ADDRESS")?, "INTENT_BOOK_ADDRESS")?;

        let weights = parse_weight_csv(&required("VERIFIER_WEIGHT_SNAPSHOT")?)?;
        let claim_threshold = match get("CLAIM_THRESHOLD_WEIGHT").or_else(|| get("VERIFIER_THRESHOLD_WEIGHT")) {
            Some(v) => parse_number(v, "CLAIM_THRESHOLD_WEIGHT")?,
            None => 3,
        };
        let intent_threshold = match get("INTENT_THRESHOLD_WEIGHT") {
            Some(v) => parse_number(v, "INTENT_THRESHOLD_WEIGHT")?,
            None => 5,
        };
        let overrides = match get("FUND_THRESHOLD_OVERRIDES") {
            Some(v) => parse_threshold_overrides(&v)?,
            None => HashMap::new(),
        };
        let allowlist = match get("VERIFIER_ALLOWLIST") {
            Some(v) => parse_csv(&v)
                .map(|a| parse_env_address(a, "VERIFIER_ALLOWLIST"))
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => BTreeSet::new(),
        };

        let quorum = QuorumPolicy::new(
            weights,
            FundThresholds {
                claim: claim_threshold,
                intent: intent_threshold,
            },
            overrides,
            allowlist,
        )?;

        let defaults = ExecutionSettings::default();
        let execution = ExecutionSettings {
            max_attempts: optional_number(&get, "EXECUTION_MAX_ATTEMPTS", defaults.max_attempts)?,
            batch_limit: optional_number(&get, "EXECUTION_BATCH_LIMIT", defaults.batch_limit)?,
            retry_base_secs: optional_number(&get, "EXECUTION_RETRY_BASE_SECS", defaults.retry_base_secs)?,
            tick_secs: optional_number(&get, "EXECUTION_TICK_SECS", defaults.tick_secs)?,
        };
        if execution.max_attempts == 0 {
            return Err(ConfigError::invalid("EXECUTION_MAX_ATTEMPTS", "must be at least 1"));
        }

        let outbox_defaults = OutboxSettings::default();
        let outbox = OutboxSettings {
            history_limit: optional_number(&get, "OUTBOX_HISTORY_LIMIT", outbox_defaults.history_limit)?,
            replay_limit: optional_number(&get, "OUTBOX_REPLAY_LIMIT", outbox_defaults.replay_limit)?,
        };

        Ok(Self {
            chain_id,
            claim_book_address,
            intent_book_address,
            quorum,
            execution,
            cron_secret: get("CRON_SECRET"),
            outbox,
        })
    }

    pub fn claim_domain(&self) -> AttestationDomain {
        AttestationDomain::claim_book(self.chain_id, self.claim_book_address)
    }

    pub fn intent_domain(&self) -> AttestationDomain {
        AttestationDomain::intent_book(self.chain_id, self.intent_book_address)
    }
}

/// Validator weights, thresholds and the verifier allowlist
#[derive(Clone, Debug)]
pub struct QuorumPolicy {
    weights: ValidatorWeightMap,
    defaults: FundThresholds,
    overrides: HashMap<String, FundThresholds>,
    allowlist: BTreeSet<Address>,
}

impl QuorumPolicy {
    /// Every threshold, default and per fund, must be reachable
    pub fn new(
        weights: Vec<ValidatorWeight>,
        defaults: FundThresholds,
        overrides: HashMap<String, FundThresholds>,
        allowlist: BTreeSet<Address>,
    ) -> Result<Self, ConfigError> {
        let weights = ValidatorWeightMap::build(&weights, false)?;
        for thresholds in std::iter::once(&defaults).chain(overrides.values()) {
            ValidatorSnapshot::new("config", weights.clone(), thresholds.claim)?;
            ValidatorSnapshot::new("config", weights.clone(), thresholds.intent)?;
        }
        Ok(Self {
            weights,
            defaults,
            overrides,
            allowlist,
        })
    }

    pub fn thresholds(&self, fund_id: &str) -> FundThresholds {
        self.overrides.get(fund_id).copied().unwrap_or(self.defaults)
    }

    pub fn default_thresholds(&self) -> FundThresholds {
        self.defaults
    }

    /// Funds with their own thresholds, sorted
    pub fn overridden_funds(&self) -> Vec<&str> {
        let mut funds: Vec<&str> = self.overrides.keys().map(String::as_str).collect();
        funds.sort_unstable();
        funds
    }

    pub fn allowlist(&self) -> &BTreeSet<Address> {
        &self.allowlist
    }

    pub fn claim_snapshot(&self, fund_id: &str, epoch_id: u64) -> Result<ValidatorSnapshot, SignerError> {
        ValidatorSnapshot::new(
            ValidatorSnapshot::claim_snapshot_id(fund_id, epoch_id),
            self.weights.clone(),
            self.thresholds(fund_id).claim,
        )
    }

    pub fn intent_snapshot(&self, fund_id: &str) -> Result<ValidatorSnapshot, SignerError> {
        ValidatorSnapshot::new(
            ValidatorSnapshot::intent_snapshot_id(fund_id),
            self.weights.clone(),
            self.thresholds(fund_id).intent,
        )
    }

    /// An empty allowlist admits every validator in the weight snapshot
    pub fn is_allowed(&self, verifier: &Address) -> bool {
        if self.allowlist.is_empty() {
            self.weights.contains(verifier)
        } else {
            self.allowlist.contains(verifier)
        }
    }

    pub fn weights(&self) -> &ValidatorWeightMap {
        &self.weights
    }
}

fn parse_csv(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_env_address(value: &str, var: &'static str) -> Result<Address, ConfigError> {
    parse_address(var, value).map_err(|e| ConfigError::invalid(var, e.to_string()))
}

fn parse_number<T: std::str::FromStr>(value: String, var: &'static str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(var, format!("not a number: {value}")))
}

fn optional_number<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(v) => parse_number(v, var),
        None => Ok(default),
    }
}

/// `address:weight,address:weight`
pub fn parse_weight_csv(value: &str) -> Result<Vec<ValidatorWeight>, ConfigError> {
    const VAR: &str = "VERIFIER_WEIGHT_SNAPSHOT";
    let entries: Vec<ValidatorWeight> = parse_csv(value)
        .map(|entry| {
            let (address, weight) = entry
                .split_once(':')
                .ok_or_else(|| ConfigError::invalid(VAR, format!("entry without weight: {entry}")))?;
            let address = parse_env_address(address.trim(), VAR)?;
            let weight: i128 = weight
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(VAR, format!("invalid weight in entry: {entry}")))?;
            Ok(ValidatorWeight::new(address, weight))
        })
        .collect::<Result<_, ConfigError>>()?;
    if entries.is_empty() {
        return Err(ConfigError::invalid(VAR, "no validators"));
    }
    Ok(entries)
}

/// `fundId:claimWeight:intentWeight,...`
pub fn parse_threshold_overrides(value: &str) -> Result<HashMap<String, FundThresholds>, ConfigError> {
    const VAR: &str = "FUND_THRESHOLD_OVERRIDES";
    let mut overrides = HashMap::new();
    for entry in parse_csv(value) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let [fund_id, claim, intent] = parts.as_slice() else {
            return Err(ConfigError::invalid(VAR, format!("expected fundId:claim:intent, got {entry}")));
        };
        if fund_id.is_empty() {
            return Err(ConfigError::invalid(VAR, format!("empty fund id in {entry}")));
        }
        let claim = parse_number(claim.to_string(), VAR)?;
        let intent = parse_number(intent.to_string(), VAR)?;
        if overrides
            .insert(fund_id.to_string(), FundThresholds { claim, intent })
            .is_some()
        {
            return Err(ConfigError::invalid(VAR, format!("duplicate fund id {fund_id}")));
        }
    }
    Ok(overrides)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) const CLAIM_BOOK: &str = "0x00000000000000000000000000000000000c1a10";
    pub(crate) const INTENT_BOOK: &str = "0x00000000000000000000000000000000001a7e17";

    /// Config over the given `address:weight` CSV with claim/intent thresholds
    pub(crate) fn config_with(weights: &str, claim: u128, intent: u128) -> RelayerConfig {
        let vars: HashMap<&str, String> = HashMap::from([
            ("CHAIN_ID", "10143".to_string()),
            ("CLAIM_BOOK_ADDRESS", CLAIM_BOOK.to_string()),
            ("INTENT_BOOK_ADDRESS", INTENT_BOOK.to_string()),
            ("VERIFIER_WEIGHT_SNAPSHOT", weights.to_string()),
            ("CLAIM_THRESHOLD_WEIGHT", claim.to_string()),
            ("INTENT_THRESHOLD_WEIGHT", intent.to_string()),
            ("CRON_SECRET", "cron-secret".to_string()),
        ]);
        RelayerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap()
    }
}
