//! Bot, fund, membership and bot nonce repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use claw_core::Address;

use crate::entities::{BotEntity, BotRole, FundBotMembership, FundEntity};
use crate::error::{StoreError, StoreResult};

/// Bot registry
#[async_trait]
pub trait BotRepository: Send + Sync {
    /// Register a bot or add a role to it. An existing bot bound to a
    /// different address is a duplicate.
    async fn upsert_role(
        &self,
        bot_id: &str,
        address: Address,
        role: BotRole,
        now: DateTime<Utc>,
    ) -> StoreResult<BotEntity>;

    async fn get(&self, bot_id: &str) -> StoreResult<Option<BotEntity>>;

    async fn get_required(&self, bot_id: &str) -> StoreResult<BotEntity> {
        self.get(bot_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Bot", bot_id))
    }

    async fn count(&self) -> StoreResult<usize>;
}

/// Fund repository
#[async_trait]
pub trait FundRepository: Send + Sync {
    /// Create a fund, failing with `Duplicate` if the id is taken
    async fn create(&self, entity: FundEntity) -> StoreResult<FundEntity>;

    async fn get(&self, fund_id: &str) -> StoreResult<Option<FundEntity>>;

    async fn get_required(&self, fund_id: &str) -> StoreResult<FundEntity> {
        self.get(fund_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Fund", fund_id))
    }

    async fn count(&self) -> StoreResult<usize>;
}

/// Fund membership repository
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Add a membership, failing with `Duplicate` if the bot is already in the fund
    async fn add(&self, entity: FundBotMembership) -> StoreResult<FundBotMembership>;

    async fn get(&self, fund_id: &str, bot_id: &str) -> StoreResult<Option<FundBotMembership>>;

    async fn list_by_fund(&self, fund_id: &str) -> StoreResult<Vec<FundBotMembership>>;
}

/// One-time bot request nonces
#[async_trait]
pub trait BotNonceRepository: Send + Sync {
    /// Returns `false` when `(bot_id, nonce)` was already recorded
    async fn insert_if_absent(
        &self,
        bot_id: &str,
        nonce: &str,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Forget nonces older than `cutoff`; returns how many were dropped
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}
