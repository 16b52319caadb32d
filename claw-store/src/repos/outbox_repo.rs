//! Durable outbox

use async_trait::async_trait;

use crate::entities::{EventType, NewOutboxEvent, OutboxEventEntity};
use crate::error::StoreResult;

/// Event selection shared by durable replay and live delivery
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboxFilter {
    pub fund_id: Option<String>,
    /// `None` or empty selects every type
    pub types: Option<Vec<EventType>>,
}

impl OutboxFilter {
    pub fn matches(&self, event: &OutboxEventEntity) -> bool {
        if let Some(fund_id) = &self.fund_id {
            if &event.fund_id != fund_id {
                return false;
            }
        }
        match &self.types {
            Some(types) if !types.is_empty() => types.contains(&event.event_type),
            _ => true,
        }
    }
}

/// Append-only event log
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Append and assign the next id
    async fn append(&self, event: NewOutboxEvent) -> StoreResult<OutboxEventEntity>;

    /// Matching events with `id > after_id`, ascending, at most `limit`
    async fn list_since(
        &self,
        after_id: u64,
        filter: &OutboxFilter,
        limit: usize,
    ) -> StoreResult<Vec<OutboxEventEntity>>;

    /// Highest assigned id, 0 when empty
    async fn latest_id(&self) -> StoreResult<u64>;
}
