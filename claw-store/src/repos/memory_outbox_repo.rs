//! In-memory outbox

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::outbox_repo::{OutboxFilter, OutboxRepository};
use crate::entities::{NewOutboxEvent, OutboxEventEntity};
use crate::error::StoreResult;

#[derive(Default)]
struct OutboxLog {
    next_id: u64,
    events: BTreeMap<u64, OutboxEventEntity>,
}

#[derive(Default)]
pub struct MemoryOutboxRepository {
    log: RwLock<OutboxLog>,
}

impl MemoryOutboxRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxRepository for MemoryOutboxRepository {
    async fn append(&self, event: NewOutboxEvent) -> StoreResult<OutboxEventEntity> {
        let mut log = self.log.write().await;
        log.next_id += 1;
        let entity = OutboxEventEntity {
            id: log.next_id,
            event_type: event.event_type,
            fund_id: event.fund_id,
            payload: event.payload,
            created_at: Utc::now(),
        };
        log.events.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn list_since(
        &self,
        after_id: u64,
        filter: &OutboxFilter,
        limit: usize,
    ) -> StoreResult<Vec<OutboxEventEntity>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .range(after_id.saturating_add(1)..)
            .map(|(_, e)| e)
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_id(&self) -> StoreResult<u64> {
        Ok(self.log.read().await.next_id)
    }
}
