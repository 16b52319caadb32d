//! Weighted Validator Set
//!
//! Validator weights for quorum evaluation. A subject is actionable once the
//! summed weight of its distinct attesters reaches the threshold.
//!
//! Weights are keyed by address bytes, so letter case of the hex form never
//! creates a second entry. Evaluation only depends on the set of attesters,
//! never on their order or on repeats.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{SignerError, SignerResult};

/// One configured validator entry. Weight is signed so that negative input
/// can be rejected instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorWeight {
    pub validator: Address,
    pub weight: i128,
}

impl ValidatorWeight {
    pub fn new(validator: Address, weight: i128) -> Self {
        Self { validator, weight }
    }
}

/// Validated validator -> weight map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorWeightMap {
    weights: BTreeMap<Address, u128>,
}

impl ValidatorWeightMap {
    /// Build from entries.
    ///
    /// Rejects negative weights, zero weights unless `allow_zero_weight`, and
    /// duplicate validators.
    pub fn build(entries: &[ValidatorWeight], allow_zero_weight: bool) -> SignerResult<Self> {
        let mut weights = BTreeMap::new();
        for entry in entries {
            if entry.weight < 0 {
                return Err(SignerError::NegativeWeight {
                    validator: entry.validator.to_string(),
                    weight: entry.weight,
                });
            }
            if entry.weight == 0 && !allow_zero_weight {
                return Err(SignerError::ZeroWeight {
                    validator: entry.validator.to_string(),
                });
            }
            if weights
                .insert(entry.validator, entry.weight.unsigned_abs())
                .is_some()
            {
                return Err(SignerError::DuplicateValidator(entry.validator.to_string()));
            }
        }
        Ok(Self { weights })
    }

    /// Weight of a validator, zero when unknown
    pub fn weight_of(&self, validator: &Address) -> u128 {
        self.weights.get(validator).copied().unwrap_or(0)
    }

    pub fn contains(&self, validator: &Address) -> bool {
        self.weights.contains_key(validator)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn validators(&self) -> impl Iterator<Item = &Address> {
        self.weights.keys()
    }

    /// Sum of all weights
    pub fn total_weight(&self) -> SignerResult<u128> {
        self.weights
            .values()
            .try_fold(0u128, |acc, w| acc.checked_add(*w))
            .ok_or(SignerError::WeightOverflow)
    }

    /// Summed weight of distinct attesters; unknown attesters add nothing
    pub fn attested_weight<'a, I>(&self, attesters: I) -> SignerResult<u128>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        let distinct: BTreeSet<&Address> = attesters.into_iter().collect();
        distinct
            .into_iter()
            .map(|a| self.weight_of(a))
            .try_fold(0u128, |acc, w| acc.checked_add(w))
            .ok_or(SignerError::WeightOverflow)
    }
}

/// Inclusive threshold check; a zero threshold is a configuration error
pub fn reached_threshold(attested_weight: u128, threshold_weight: u128) -> SignerResult<bool> {
    if threshold_weight == 0 {
        return Err(SignerError::InvalidThreshold);
    }
    Ok(attested_weight >= threshold_weight)
}

/// Threshold evaluation with the totals needed for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdState {
    pub total_weight: u128,
    pub attested_weight: u128,
    pub threshold_weight: u128,
    pub met: bool,
}

pub fn weighted_threshold_state<'a, I>(
    weights: &ValidatorWeightMap,
    attesters: I,
    threshold_weight: u128,
) -> SignerResult<ThresholdState>
where
    I: IntoIterator<Item = &'a Address>,
{
    let total_weight = weights.total_weight()?;
    let attested_weight = weights.attested_weight(attesters)?;
    let met = reached_threshold(attested_weight, threshold_weight)?;
    Ok(ThresholdState {
        total_weight,
        attested_weight,
        threshold_weight,
        met,
    })
}

/// Weight map plus threshold for one subject family.
///
/// An unreachable threshold is rejected here, at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSnapshot {
    pub snapshot_id: String,
    pub threshold_weight: u128,
    pub total_weight: u128,
    weights: ValidatorWeightMap,
}

impl ValidatorSnapshot {
    pub fn new(
        snapshot_id: impl Into<String>,
        weights: ValidatorWeightMap,
        threshold_weight: u128,
    ) -> SignerResult<Self> {
        if weights.is_empty() {
            return Err(SignerError::EmptySnapshot);
        }
        if threshold_weight == 0 {
            return Err(SignerError::InvalidThreshold);
        }
        let total_weight = weights.total_weight()?;
        if threshold_weight > total_weight {
            return Err(SignerError::ThresholdExceedsTotal {
                threshold: threshold_weight,
                total: total_weight,
            });
        }
        Ok(Self {
            snapshot_id: snapshot_id.into(),
            threshold_weight,
            total_weight,
            weights,
        })
    }

    /// Snapshot id for claims of one fund epoch
    pub fn claim_snapshot_id(fund_id: &str, epoch_id: u64) -> String {
        format!("{fund_id}:{epoch_id}:claim")
    }

    /// Snapshot id for intents of one fund
    pub fn intent_snapshot_id(fund_id: &str) -> String {
        format!("{fund_id}:intent")
    }

    pub fn weights(&self) -> &ValidatorWeightMap {
        &self.weights
    }

    pub fn weight_of(&self, validator: &Address) -> u128 {
        self.weights.weight_of(validator)
    }

    pub fn evaluate<'a, I>(&self, attesters: I) -> SignerResult<ThresholdState>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        weighted_threshold_state(&self.weights, attesters, self.threshold_weight)
    }
}
