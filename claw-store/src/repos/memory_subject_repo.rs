//! In-memory subject, attestation and epoch repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::replay::assert_nonce_strictly_increases;
use claw_core::{Address, SubjectType, B256, U256};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::subject_repo::*;
use crate::entities::{
    subject_key, AttestationEntity, EpochEntity, SubjectEntity, SubjectStatus,
};
use crate::error::{StoreError, StoreResult};

type SubjectKey = (String, SubjectType, B256);

fn key_of(fund_id: &str, subject_type: SubjectType, subject_hash: &B256) -> SubjectKey {
    (fund_id.to_string(), subject_type, *subject_hash)
}

#[derive(Default)]
pub struct MemorySubjectRepository {
    subjects: RwLock<HashMap<SubjectKey, SubjectEntity>>,
}

impl MemorySubjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubjectRepository for MemorySubjectRepository {
    async fn insert_new(&self, entity: SubjectEntity) -> StoreResult<SubjectEntity> {
        let key = key_of(&entity.fund_id, entity.subject_type, &entity.subject_hash);
        let mut subjects = self.subjects.write().await;
        if subjects.contains_key(&key) {
            return Err(StoreError::duplicate(entity.subject_type.label(), entity.key()));
        }
        subjects.insert(key, entity.clone());
        Ok(entity)
    }

    async fn get_or_insert(&self, entity: SubjectEntity) -> StoreResult<SubjectEntity> {
        let key = key_of(&entity.fund_id, entity.subject_type, &entity.subject_hash);
        let mut subjects = self.subjects.write().await;
        Ok(subjects.entry(key).or_insert(entity).clone())
    }

    async fn get(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
    ) -> StoreResult<Option<SubjectEntity>> {
        let key = key_of(fund_id, subject_type, subject_hash);
        Ok(self.subjects.read().await.get(&key).cloned())
    }

    async fn update_weight(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
        attested_weight: u128,
    ) -> StoreResult<SubjectEntity> {
        let key = key_of(fund_id, subject_type, subject_hash);
        let mut subjects = self.subjects.write().await;
        let subject = subjects.get_mut(&key).ok_or_else(|| {
            StoreError::not_found(
                subject_type.label(),
                subject_key(fund_id, subject_type, subject_hash),
            )
        })?;
        subject.attested_weight = subject.attested_weight.max(attested_weight);
        Ok(subject.clone())
    }

    async fn mark_approved(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let key = key_of(fund_id, subject_type, subject_hash);
        let mut subjects = self.subjects.write().await;
        let subject = subjects.get_mut(&key).ok_or_else(|| {
            StoreError::not_found(
                subject_type.label(),
                subject_key(fund_id, subject_type, subject_hash),
            )
        })?;
        if subject.status == SubjectStatus::Approved {
            return Ok(false);
        }
        subject.status = SubjectStatus::Approved;
        subject.approved_at = Some(now);
        Ok(true)
    }

    async fn list_approved_claims(&self, fund_id: &str, epoch_id: u64) -> StoreResult<Vec<B256>> {
        let subjects = self.subjects.read().await;
        Ok(subjects
            .values()
            .filter(|s| {
                s.fund_id == fund_id
                    && s.subject_type == SubjectType::Claim
                    && s.epoch_id == Some(epoch_id)
                    && s.is_approved()
            })
            .map(|s| s.subject_hash)
            .collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.subjects.read().await.len())
    }
}

#[derive(Default)]
struct AttestationTables {
    by_subject: HashMap<SubjectKey, HashMap<Address, AttestationEntity>>,
    last_nonce: HashMap<(Address, SubjectType), U256>,
    total: usize,
}

#[derive(Default)]
pub struct MemoryAttestationRepository {
    tables: RwLock<AttestationTables>,
}

impl MemoryAttestationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttestationRepository for MemoryAttestationRepository {
    async fn insert(&self, entity: AttestationEntity) -> StoreResult<AttestationEntity> {
        let mut tables = self.tables.write().await;

        let nonce_key = (entity.verifier, entity.subject_type);
        assert_nonce_strictly_increases(tables.last_nonce.get(&nonce_key).copied(), entity.nonce)?;

        let key = key_of(&entity.fund_id, entity.subject_type, &entity.subject_hash);
        if tables
            .by_subject
            .get(&key)
            .is_some_and(|m| m.contains_key(&entity.verifier))
        {
            return Err(StoreError::duplicate(
                "Attestation",
                format!(
                    "{}:{}",
                    subject_key(&entity.fund_id, entity.subject_type, &entity.subject_hash),
                    entity.verifier
                ),
            ));
        }

        tables.last_nonce.insert(nonce_key, entity.nonce);
        tables
            .by_subject
            .entry(key)
            .or_default()
            .insert(entity.verifier, entity.clone());
        tables.total += 1;
        Ok(entity)
    }

    async fn last_nonce(
        &self,
        verifier: &Address,
        subject_type: SubjectType,
    ) -> StoreResult<Option<U256>> {
        let tables = self.tables.read().await;
        Ok(tables.last_nonce.get(&(*verifier, subject_type)).copied())
    }

    async fn list_attesters(
        &self,
        fund_id: &str,
        subject_type: SubjectType,
        subject_hash: &B256,
    ) -> StoreResult<Vec<Address>> {
        let tables = self.tables.read().await;
        let key = key_of(fund_id, subject_type, subject_hash);
        let attesters: BTreeSet<Address> = tables
            .by_subject
            .get(&key)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        Ok(attesters.into_iter().collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.tables.read().await.total)
    }
}

#[derive(Default)]
pub struct MemoryEpochRepository {
    epochs: RwLock<HashMap<(String, u64), EpochEntity>>,
}

impl MemoryEpochRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EpochRepository for MemoryEpochRepository {
    async fn open_if_absent(
        &self,
        fund_id: &str,
        epoch_id: u64,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut epochs = self.epochs.write().await;
        let key = (fund_id.to_string(), epoch_id);
        if epochs.contains_key(&key) {
            return Ok(false);
        }
        epochs.insert(
            key,
            EpochEntity {
                fund_id: fund_id.to_string(),
                epoch_id,
                opened_at: now,
                snapshot_hash: None,
                epoch_state_hash: None,
                claim_count: 0,
                finalized_at: None,
            },
        );
        Ok(true)
    }

    async fn record_snapshot(
        &self,
        fund_id: &str,
        epoch_id: u64,
        snapshot_hash: B256,
        epoch_state_hash: B256,
        claim_count: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<EpochEntity> {
        let mut epochs = self.epochs.write().await;
        let epoch = epochs
            .entry((fund_id.to_string(), epoch_id))
            .or_insert_with(|| EpochEntity {
                fund_id: fund_id.to_string(),
                epoch_id,
                opened_at: now,
                snapshot_hash: None,
                epoch_state_hash: None,
                claim_count: 0,
                finalized_at: None,
            });
        epoch.snapshot_hash = Some(snapshot_hash);
        epoch.epoch_state_hash = Some(epoch_state_hash);
        epoch.claim_count = claim_count;
        epoch.finalized_at = Some(now);
        Ok(epoch.clone())
    }

    async fn get(&self, fund_id: &str, epoch_id: u64) -> StoreResult<Option<EpochEntity>> {
        let key = (fund_id.to_string(), epoch_id);
        Ok(self.epochs.read().await.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_core::ProtocolError;

    fn attestation(verifier: Address, hash: B256, nonce: u64) -> AttestationEntity {
        AttestationEntity {
            fund_id: "fund-1".into(),
            subject_type: SubjectType::Intent,
            subject_hash: hash,
            verifier,
            epoch_id: None,
            expires_at: 2_000_000_000,
            nonce: U256::from(nonce),
            signature: "0x".into(),
            digest: B256::ZERO,
            submitted_by: "bot-1".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_attestation_nonce_must_increase_per_verifier_and_type() {
        let repo = MemoryAttestationRepository::new();
        let a = Address::repeat_byte(0xaa);
        let h1 = B256::repeat_byte(1);
        let h2 = B256::repeat_byte(2);

        repo.insert(attestation(a, h1, 5)).await.unwrap();
        let err = repo.insert(attestation(a, h2, 5)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Replay(ProtocolError::NonceNotIncreasing { .. })
        ));
        repo.insert(attestation(a, h2, 6)).await.unwrap();

        // claim nonces are tracked separately
        let mut claim = attestation(a, h1, 1);
        claim.subject_type = SubjectType::Claim;
        repo.insert(claim).await.unwrap();

        assert_eq!(
            repo.last_nonce(&a, SubjectType::Intent).await.unwrap(),
            Some(U256::from(6))
        );
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_attestation_unique_per_subject_and_verifier() {
        let repo = MemoryAttestationRepository::new();
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);
        let h = B256::repeat_byte(1);

        repo.insert(attestation(a, h, 1)).await.unwrap();
        let err = repo.insert(attestation(a, h, 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        repo.insert(attestation(b, h, 1)).await.unwrap();

        let attesters = repo
            .list_attesters("fund-1", SubjectType::Intent, &h)
            .await
            .unwrap();
        assert_eq!(attesters, vec![a, b]);
        // rejected duplicate did not advance the nonce
        assert_eq!(
            repo.last_nonce(&a, SubjectType::Intent).await.unwrap(),
            Some(U256::from(1))
        );
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_attestations_count_once() {
        let repo = std::sync::Arc::new(MemoryAttestationRepository::new());
        let a = Address::repeat_byte(0xaa);
        let h = B256::repeat_byte(9);

        let mut handles = Vec::new();
        for nonce in 1..=8u64 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.insert(attestation(a, h, nonce)).await.is_ok()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(
            repo.list_attesters("fund-1", SubjectType::Intent, &h)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_subject_approval_transitions_once() {
        let repo = MemorySubjectRepository::new();
        let h = B256::repeat_byte(3);
        let subject = SubjectEntity::pending("fund-1", SubjectType::Claim, h, Some(7), 3);
        repo.insert_new(subject.clone()).await.unwrap();
        assert!(repo.insert_new(subject.clone()).await.is_err());
        assert_eq!(repo.get_or_insert(subject).await.unwrap().epoch_id, Some(7));

        repo.update_weight("fund-1", SubjectType::Claim, &h, 4)
            .await
            .unwrap();
        let stale = repo
            .update_weight("fund-1", SubjectType::Claim, &h, 2)
            .await
            .unwrap();
        assert_eq!(stale.attested_weight, 4);
        let now = Utc::now();
        assert!(repo
            .mark_approved("fund-1", SubjectType::Claim, &h, now)
            .await
            .unwrap());
        assert!(!repo
            .mark_approved("fund-1", SubjectType::Claim, &h, now)
            .await
            .unwrap());

        assert_eq!(
            repo.list_approved_claims("fund-1", 7).await.unwrap(),
            vec![h]
        );
        assert!(repo.list_approved_claims("fund-1", 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_epoch_open_once() {
        let repo = MemoryEpochRepository::new();
        let now = Utc::now();
        assert!(repo.open_if_absent("fund-1", 1, now).await.unwrap());
        assert!(!repo.open_if_absent("fund-1", 1, now).await.unwrap());

        let epoch = repo
            .record_snapshot("fund-1", 1, B256::repeat_byte(1), B256::repeat_byte(2), 1, now)
            .await
            .unwrap();
        assert_eq!(epoch.claim_count, 1);
        assert!(epoch.finalized_at.is_some());
    }
}
