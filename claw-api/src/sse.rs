//! Server-Sent Events
//!
//! Each outbox event goes out as
//!
//! ```text
//! event: intent:ready
//! data: {"fundId":"alpha","intentHash":"0x..","jobId":".."}
//! id: 42
//! ```
//!
//! Clients reconnect with `Last-Event-ID` to resume after the last id they
//! processed. Without the header there is no replay.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use claw_store::{EventType, OutboxEventEntity, OutboxFilter};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};

use crate::dto::EventStreamQuery;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const LAST_EVENT_ID: &str = "last-event-id";

const KEEP_ALIVE_SECS: u64 = 15;

const INTENT_EVENTS: [EventType; 5] = [
    EventType::IntentProposed,
    EventType::IntentAttested,
    EventType::IntentReady,
    EventType::IntentExecuted,
    EventType::IntentFailed,
];

/// `GET /events/stream?fundId=&types=a,b`
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventStreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let filter = OutboxFilter {
        fund_id: query.fund_id.filter(|f| !f.trim().is_empty()),
        types: parse_types(query.types.as_deref())?,
    };
    open_stream(&state, filter, &headers).await
}

/// `GET /funds/:fund_id/events/intents`; `types` may narrow the intent events
pub async fn fund_intent_stream(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
    Query(query): Query<EventStreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let types = match parse_types(query.types.as_deref())? {
        Some(types) => {
            if let Some(other) = types.iter().find(|t| !INTENT_EVENTS.contains(t)) {
                return Err(ApiError::validation(format!(
                    "event type {other} is not an intent event"
                )));
            }
            types
        }
        None => INTENT_EVENTS.to_vec(),
    };
    let filter = OutboxFilter {
        fund_id: Some(fund_id),
        types: Some(types),
    };
    open_stream(&state, filter, &headers).await
}

async fn open_stream(
    state: &AppState,
    filter: OutboxFilter,
    headers: &HeaderMap,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let since = last_event_id(headers);
    tracing::debug!(fund_id = ?filter.fund_id, ?since, "event stream opened");

    let subscription = state.outbox.subscribe(filter, since).await?;
    let stream = subscription
        .into_stream()
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keepalive"),
    ))
}

fn to_sse(event: &OutboxEventEntity) -> Event {
    Event::default()
        .event(event.event_type.as_str())
        .data(event.payload.to_string())
        .id(event.id.to_string())
}

/// Comma separated event types; blank means all. Unknown names are rejected.
pub fn parse_types(raw: Option<&str>) -> ApiResult<Option<Vec<EventType>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let types = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<EventType>().map_err(ApiError::validation))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(if types.is_empty() { None } else { Some(types) })
}

/// `Last-Event-ID` as a non-negative integer; anything else means no replay
pub fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
