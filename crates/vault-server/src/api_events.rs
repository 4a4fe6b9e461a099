//! Event journal endpoints.
//!
//! Provides:
//! - `GET /api/tenants/{tenantId}/events`: latest events, newest first
//! - `POST /api/tenants/{tenantId}/events/{eventId}/read`: mark one read
//! - `GET /api/tenants/{tenantId}/events/stream`: SSE live stream

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio_stream::StreamExt;
use vault_types::Event;

/// Query parameters for `GET /api/tenants/{tenantId}/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

/// Response wrapper for event retrieval.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    /// The tenant's events, newest first.
    pub events: Vec<Event>,
    /// The number of events returned.
    pub count: usize,
}

/// Handler for `GET /api/tenants/{tenantId}/events`.
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000) as usize;

    let events = state
        .updater
        .with_store(move |store| store.list_events(&tenant_id, limit))
        .await?;

    let count = events.len();
    Ok(Json(EventsResponse { events, count }))
}

/// Handler for `POST /api/tenants/{tenantId}/events/{eventId}/read`.
pub async fn mark_read_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((tenant_id, event_id)): Path<(String, String)>,
) -> Result<Json<Event>, ApiError> {
    let event = state
        .updater
        .with_store(move |store| store.mark_event_read(&tenant_id, &event_id))
        .await?;
    Ok(Json(event))
}

/// Handler for `GET /api/tenants/{tenantId}/events/stream`.
///
/// Streams the tenant's events as they are journaled. The subscription
/// lives exactly as long as the response body.
pub async fn event_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let events = state.updater.subscribe_until_dropped(&tenant_id).await;
    tracing::info!(
        tenant_id = %tenant_id,
        subscription_id = %events.subscription_id(),
        "live event stream opened"
    );

    let mapped_stream = events.filter_map(|view| match serde_json::to_string(&view) {
        Ok(data) => Some(Ok(SseEvent::default().data(data))),
        Err(e) => {
            tracing::error!("failed to serialize event view: {}", e);
            None
        }
    });

    Sse::new(mapped_stream).keep_alive(KeepAlive::default())
}
