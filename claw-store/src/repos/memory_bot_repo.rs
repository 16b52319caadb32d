//! In-memory bot, fund, membership and nonce repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::Address;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::bot_repo::*;
use crate::entities::{BotEntity, BotRole, FundBotMembership, FundEntity};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryBotRepository {
    bots: RwLock<HashMap<String, BotEntity>>,
}

impl MemoryBotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotRepository for MemoryBotRepository {
    async fn upsert_role(
        &self,
        bot_id: &str,
        address: Address,
        role: BotRole,
        now: DateTime<Utc>,
    ) -> StoreResult<BotEntity> {
        let mut bots = self.bots.write().await;
        match bots.get_mut(bot_id) {
            Some(existing) if existing.address != address => {
                Err(StoreError::duplicate("Bot", bot_id))
            }
            Some(existing) => {
                if existing.roles.insert(role) {
                    existing.updated_at = now;
                }
                Ok(existing.clone())
            }
            None => {
                let entity = BotEntity {
                    bot_id: bot_id.to_string(),
                    address,
                    roles: BTreeSet::from([role]),
                    created_at: now,
                    updated_at: now,
                };
                bots.insert(bot_id.to_string(), entity.clone());
                Ok(entity)
            }
        }
    }

    async fn get(&self, bot_id: &str) -> StoreResult<Option<BotEntity>> {
        Ok(self.bots.read().await.get(bot_id).cloned())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.bots.read().await.len())
    }
}

#[derive(Default)]
pub struct MemoryFundRepository {
    funds: RwLock<HashMap<String, FundEntity>>,
}

impl MemoryFundRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FundRepository for MemoryFundRepository {
    async fn create(&self, entity: FundEntity) -> StoreResult<FundEntity> {
        let mut funds = self.funds.write().await;
        if funds.contains_key(&entity.fund_id) {
            return Err(StoreError::duplicate("Fund", entity.fund_id));
        }
        funds.insert(entity.fund_id.clone(), entity.clone());
        Ok(entity)
    }

    async fn get(&self, fund_id: &str) -> StoreResult<Option<FundEntity>> {
        Ok(self.funds.read().await.get(fund_id).cloned())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.funds.read().await.len())
    }
}

#[derive(Default)]
pub struct MemoryMembershipRepository {
    memberships: RwLock<HashMap<(String, String), FundBotMembership>>,
}

impl MemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipRepository for MemoryMembershipRepository {
    async fn add(&self, entity: FundBotMembership) -> StoreResult<FundBotMembership> {
        let key = (entity.fund_id.clone(), entity.bot_id.clone());
        let mut memberships = self.memberships.write().await;
        if memberships.contains_key(&key) {
            return Err(StoreError::duplicate(
                "FundBotMembership",
                format!("{}:{}", key.0, key.1),
            ));
        }
        memberships.insert(key, entity.clone());
        Ok(entity)
    }

    async fn get(&self, fund_id: &str, bot_id: &str) -> StoreResult<Option<FundBotMembership>> {
        let key = (fund_id.to_string(), bot_id.to_string());
        Ok(self.memberships.read().await.get(&key).cloned())
    }

    async fn list_by_fund(&self, fund_id: &str) -> StoreResult<Vec<FundBotMembership>> {
        let memberships = self.memberships.read().await;
        let mut list: Vec<_> = memberships
            .values()
            .filter(|m| m.fund_id == fund_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.bot_id.cmp(&b.bot_id)));
        Ok(list)
    }
}

#[derive(Default)]
pub struct MemoryBotNonceRepository {
    seen: RwLock<HashMap<(String, String), DateTime<Utc>>>,
}

impl MemoryBotNonceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotNonceRepository for MemoryBotNonceRepository {
    async fn insert_if_absent(
        &self,
        bot_id: &str,
        nonce: &str,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let key = (bot_id.to_string(), nonce.to_string());
        let mut seen = self.seen.write().await;
        if seen.contains_key(&key) {
            return Ok(false);
        }
        seen.insert(key, seen_at);
        Ok(true)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut seen = self.seen.write().await;
        let before = seen.len();
        seen.retain(|_, at| *at >= cutoff);
        Ok(before - seen.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MembershipStatus;

    #[tokio::test]
    async fn test_bot_upsert_adds_roles_and_rejects_other_address() {
        let repo = MemoryBotRepository::new();
        let a = Address::repeat_byte(0x11);
        let now = Utc::now();

        repo.upsert_role("bot-1", a, BotRole::Strategy, now).await.unwrap();
        let bot = repo
            .upsert_role("bot-1", a, BotRole::Participant, now)
            .await
            .unwrap();
        assert_eq!(bot.roles.len(), 2);

        let err = repo
            .upsert_role("bot-1", Address::repeat_byte(0x22), BotRole::Strategy, now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fund_create_is_unique() {
        let repo = MemoryFundRepository::new();
        let fund = FundEntity {
            fund_id: "fund-1".into(),
            strategy_bot_id: "bot-1".into(),
            created_at: Utc::now(),
        };
        repo.create(fund.clone()).await.unwrap();
        assert!(repo.create(fund).await.is_err());
        assert!(repo.get_required("fund-2").await.is_err());
    }

    #[tokio::test]
    async fn test_membership_duplicate() {
        let repo = MemoryMembershipRepository::new();
        let m = FundBotMembership {
            fund_id: "fund-1".into(),
            bot_id: "bot-1".into(),
            role: BotRole::Participant,
            address: Address::repeat_byte(0x11),
            status: MembershipStatus::Active,
            created_at: Utc::now(),
        };
        repo.add(m.clone()).await.unwrap();
        assert!(matches!(
            repo.add(m).await.unwrap_err(),
            StoreError::Duplicate { .. }
        ));
        assert_eq!(repo.list_by_fund("fund-1").await.unwrap().len(), 1);
        assert!(repo.get("fund-1", "bot-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nonce_used_once() {
        let repo = MemoryBotNonceRepository::new();
        let now = Utc::now();
        assert!(repo.insert_if_absent("bot-1", "n1", now).await.unwrap());
        assert!(!repo.insert_if_absent("bot-1", "n1", now).await.unwrap());
        assert!(repo.insert_if_absent("bot-2", "n1", now).await.unwrap());

        let pruned = repo
            .prune_before(now + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(pruned, 2);
    }
}
