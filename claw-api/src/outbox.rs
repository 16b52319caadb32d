//! Event Outbox
//!
//! Every relayer event is appended to the durable outbox first and only then
//! fanned out to live subscribers over a broadcast channel. A failed append
//! publishes nothing.
//!
//! Reconnecting subscribers pass the last id they saw. Replay is served from
//! the bounded in-memory history when it still reaches back that far, and
//! from the durable log otherwise. A replay holds at most `replay_limit`
//! events; when that cuts it short of the head, the subscription ends after
//! the replayed page and the client resumes from the last id it got.

use claw_store::{EventType, NewOutboxEvent, OutboxEventEntity, OutboxFilter, OutboxRepository};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::config::OutboxSettings;
use crate::error::ApiResult;

const CHANNEL_CAPACITY: usize = 256;

/// Durable append plus in-process fan-out
pub struct EventOutbox {
    repo: Arc<dyn OutboxRepository>,
    sender: broadcast::Sender<OutboxEventEntity>,
    /// Held across append and send so live delivery follows id order
    history: Mutex<VecDeque<OutboxEventEntity>>,
    settings: OutboxSettings,
}

impl EventOutbox {
    pub fn new(repo: Arc<dyn OutboxRepository>, settings: OutboxSettings) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            repo,
            sender,
            history: Mutex::new(VecDeque::with_capacity(settings.history_limit)),
            settings,
        }
    }

    /// Append one event and notify live subscribers.
    ///
    /// `fundId` is always present in the stored payload.
    pub async fn publish(
        &self,
        event_type: EventType,
        fund_id: &str,
        payload: Value,
    ) -> ApiResult<OutboxEventEntity> {
        let payload = with_fund_id(payload, fund_id);
        let mut history = self.history.lock().await;

        let event = self
            .repo
            .append(NewOutboxEvent {
                event_type,
                fund_id: fund_id.to_string(),
                payload,
            })
            .await?;

        if self.settings.history_limit > 0 {
            if history.len() == self.settings.history_limit {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // no receivers is not an error
        let _ = self.sender.send(event.clone());
        drop(history);

        metrics::counter!("claw_outbox_events_total", "type" => event_type.as_str()).increment(1);
        tracing::info!(
            event_id = event.id,
            event_type = event_type.as_str(),
            fund_id = %fund_id,
            "event published"
        );
        Ok(event)
    }

    /// Publish on behalf of a write that already committed.
    ///
    /// A failed append is logged and counted; the committed write stands and
    /// the event is skipped.
    pub async fn announce(&self, event_type: EventType, fund_id: &str, payload: Value) {
        if let Err(err) = self.publish(event_type, fund_id, payload).await {
            metrics::counter!("claw_outbox_publish_failures_total", "type" => event_type.as_str())
                .increment(1);
            tracing::warn!(
                event_type = event_type.as_str(),
                fund_id = %fund_id,
                error = %err,
                "event not published"
            );
        }
    }

    /// Replay events after `since` that match `filter`, then attach live delivery
    pub async fn subscribe(
        &self,
        filter: OutboxFilter,
        since: Option<u64>,
    ) -> ApiResult<OutboxSubscription> {
        let history = self.history.lock().await;
        // subscribe before reading so nothing published in between is lost
        let receiver = self.sender.subscribe();
        let head = self.repo.latest_id().await?;

        let replay = match since {
            None => Vec::new(),
            Some(after) if covers(&history, after) => history
                .iter()
                .filter(|e| e.id > after && filter.matches(e))
                .take(self.settings.replay_limit)
                .cloned()
                .collect(),
            Some(after) => {
                tracing::debug!(after, "replaying from durable outbox");
                self.repo
                    .list_since(after, &filter, self.settings.replay_limit)
                    .await?
            }
        };
        drop(history);

        let high_water = replay.last().map(|e| e.id).or(since).unwrap_or(0);
        let caught_up = replay.len() < self.settings.replay_limit || high_water >= head;
        if !caught_up {
            tracing::debug!(high_water, head, "replay cut at limit, live delivery deferred");
        }
        Ok(OutboxSubscription {
            replay,
            receiver,
            filter,
            high_water,
            caught_up,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events currently held in memory, oldest first
    pub async fn history(&self) -> Vec<OutboxEventEntity> {
        self.history.lock().await.iter().cloned().collect()
    }

    pub async fn latest_id(&self) -> ApiResult<u64> {
        Ok(self.repo.latest_id().await?)
    }

    /// Clear the in-memory history. The durable log is untouched.
    pub async fn reset(&self) {
        self.history.lock().await.clear();
    }
}

impl std::fmt::Debug for EventOutbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventOutbox")
            .field("settings", &self.settings)
            .field("subscribers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

/// History reaches back to `after` when its oldest entry is at most `after + 1`
fn covers(history: &VecDeque<OutboxEventEntity>, after: u64) -> bool {
    match history.front() {
        Some(oldest) => oldest.id <= after.saturating_add(1),
        None => false,
    }
}

fn with_fund_id(payload: Value, fund_id: &str) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("fundId".to_string(), Value::String(fund_id.to_string()));
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "fundId": fund_id }),
        other => serde_json::json!({ "fundId": fund_id, "value": other }),
    }
}

/// Replayed events plus a live receiver
pub struct OutboxSubscription {
    pub replay: Vec<OutboxEventEntity>,
    receiver: broadcast::Receiver<OutboxEventEntity>,
    filter: OutboxFilter,
    high_water: u64,
    caught_up: bool,
}

impl OutboxSubscription {
    /// False when the replay stopped at the limit before the head
    pub fn is_caught_up(&self) -> bool {
        self.caught_up
    }

    /// Replay first, then live events with ids above the replayed ones.
    ///
    /// A subscriber that falls behind the channel ends its stream, so the
    /// client reconnects with its last id and catches up from the outbox.
    /// The same holds for a replay cut at the limit: the stream ends after it.
    pub fn into_stream(self) -> impl Stream<Item = OutboxEventEntity> + Send + 'static {
        let OutboxSubscription {
            replay,
            receiver,
            filter,
            high_water,
            caught_up,
        } = self;

        let live = BroadcastStream::new(receiver)
            .take(if caught_up { usize::MAX } else { 0 })
            .take_while(|item| match item {
                Ok(_) => true,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, closing stream");
                    false
                }
            })
            .filter_map(move |item| match item {
                Ok(event) if event.id > high_water && filter.matches(&event) => Some(event),
                _ => None,
            });

        tokio_stream::iter(replay).chain(live)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FailingOutbox;
    use super::*;
    use claw_store::MemoryOutboxRepository;
    use serde_json::json;
    use std::time::Duration;

    fn outbox(history_limit: usize) -> EventOutbox {
        limited(history_limit, 500)
    }

    fn limited(history_limit: usize, replay_limit: usize) -> EventOutbox {
        EventOutbox::new(
            Arc::new(MemoryOutboxRepository::new()),
            OutboxSettings {
                history_limit,
                replay_limit,
            },
        )
    }

    async fn drain(sub: OutboxSubscription) -> Vec<u64> {
        let mut stream = Box::pin(sub.into_stream());
        let mut ids = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(50), stream.next()).await
        {
            ids.push(event.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_publish_adds_fund_id_and_assigns_ids() {
        let outbox = outbox(10);
        let first = outbox
            .publish(EventType::EpochOpened, "fund-1", json!({ "epochId": "1" }))
            .await
            .unwrap();
        let second = outbox
            .publish(EventType::ClaimAttested, "fund-1", Value::Null)
            .await
            .unwrap();

        assert_eq!(first.payload["fundId"], "fund-1");
        assert_eq!(first.payload["epochId"], "1");
        assert_eq!(second.payload, json!({ "fundId": "fund-1" }));
        assert!(second.id > first.id);
        assert_eq!(outbox.latest_id().await.unwrap(), second.id);
    }

    #[tokio::test]
    async fn test_failed_append_does_not_fan_out() {
        let outbox = EventOutbox::new(Arc::new(FailingOutbox), OutboxSettings::default());
        let sub = outbox.subscribe(OutboxFilter::default(), None).await.unwrap();

        let err = outbox
            .publish(EventType::IntentReady, "fund-1", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
        assert!(outbox.history().await.is_empty());

        let mut stream = Box::pin(sub.into_stream());
        let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(next.is_err(), "nothing should be delivered");
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let outbox = outbox(3);
        for _ in 0..5 {
            outbox
                .publish(EventType::IntentAttested, "fund-1", json!({}))
                .await
                .unwrap();
        }
        let ids: Vec<u64> = outbox.history().await.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);

        outbox.reset().await;
        assert!(outbox.history().await.is_empty());
        assert_eq!(outbox.latest_id().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_replay_falls_back_to_durable_log() {
        let outbox = outbox(2);
        for fund in ["fund-1", "fund-2", "fund-1", "fund-1"] {
            outbox
                .publish(EventType::ClaimAttested, fund, json!({}))
                .await
                .unwrap();
        }

        // history holds 3 and 4 only; replay after 0 must come from the log
        let filter = OutboxFilter {
            fund_id: Some("fund-1".into()),
            types: None,
        };
        let sub = outbox.subscribe(filter.clone(), Some(0)).await.unwrap();
        let ids: Vec<u64> = sub.replay.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);

        let sub = outbox.subscribe(filter, Some(2)).await.unwrap();
        let ids: Vec<u64> = sub.replay.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_live_delivery_uses_same_filter() {
        let outbox = outbox(10);
        let filter = OutboxFilter {
            fund_id: Some("fund-1".into()),
            types: Some(vec![EventType::IntentReady]),
        };
        let sub = outbox.subscribe(filter, None).await.unwrap();
        assert!(sub.replay.is_empty());
        assert_eq!(outbox.subscriber_count(), 1);

        outbox
            .publish(EventType::IntentReady, "fund-2", json!({}))
            .await
            .unwrap();
        outbox
            .publish(EventType::IntentAttested, "fund-1", json!({}))
            .await
            .unwrap();
        let wanted = outbox
            .publish(EventType::IntentReady, "fund-1", json!({ "jobId": "j-1" }))
            .await
            .unwrap();

        let mut stream = Box::pin(sub.into_stream());
        let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.id, wanted.id);
        assert_eq!(got.payload["jobId"], "j-1");

        drop(stream);
        assert_eq!(outbox.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_replay_then_live_without_duplicates() {
        let outbox = outbox(10);
        outbox
            .publish(EventType::EpochOpened, "fund-1", json!({}))
            .await
            .unwrap();
        outbox
            .publish(EventType::ClaimAttested, "fund-1", json!({}))
            .await
            .unwrap();

        let sub = outbox.subscribe(OutboxFilter::default(), Some(1)).await.unwrap();
        outbox
            .publish(EventType::SnapshotFinalized, "fund-1", json!({}))
            .await
            .unwrap();

        let mut stream = Box::pin(sub.into_stream());
        let mut ids = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .unwrap()
                .unwrap();
            ids.push(event.id);
        }
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_backlog_beyond_replay_limit_resumes_without_gaps() {
        let outbox = limited(2, 3);
        for _ in 0..6 {
            outbox
                .publish(EventType::ClaimAttested, "fund-1", json!({}))
                .await
                .unwrap();
        }

        let sub = outbox.subscribe(OutboxFilter::default(), Some(0)).await.unwrap();
        assert!(!sub.is_caught_up());
        outbox
            .publish(EventType::ClaimAttested, "fund-1", json!({}))
            .await
            .unwrap();
        // the page ends the stream instead of jumping to live event 7
        let mut delivered = drain(sub).await;
        assert_eq!(delivered, vec![1, 2, 3]);

        // each reconnect resumes from the last id received
        loop {
            let last = delivered.last().copied();
            let sub = outbox.subscribe(OutboxFilter::default(), last).await.unwrap();
            let caught_up = sub.is_caught_up();
            delivered.extend(drain(sub).await);
            if caught_up {
                break;
            }
        }
        assert_eq!(delivered, (1..=7).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_full_page_at_head_stays_live() {
        let outbox = limited(10, 2);
        for _ in 0..2 {
            outbox
                .publish(EventType::IntentReady, "fund-1", json!({}))
                .await
                .unwrap();
        }
        let sub = outbox.subscribe(OutboxFilter::default(), Some(0)).await.unwrap();
        assert!(sub.is_caught_up());
        outbox
            .publish(EventType::IntentReady, "fund-1", json!({}))
            .await
            .unwrap();
        assert_eq!(drain(sub).await, vec![1, 2, 3]);
    }
}
