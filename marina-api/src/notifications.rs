use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use marina_core::{Actor, Notification};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct InboxQuery {
    #[serde(default)]
    unread_only: bool,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", get(list_notifications))
        .route("/v1/notifications/unread-count", get(unread_count))
        .route("/v1/notifications/read-all", post(mark_all_read))
        .route("/v1/notifications/{id}/read", post(mark_read))
        .route("/v1/notifications/stream", get(notification_stream))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let offset = (query.page.max(1) - 1) * query.page_size;
    let inbox = state
        .notifications
        .list_for_user(actor.user_id, query.unread_only, query.page_size, offset)
        .await?;
    Ok(Json(inbox))
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<serde_json::Value>, AppError> {
    let cache_key = actor.user_id.to_string();
    if let Ok(Some(count)) = state.redis.get_unread_count(&cache_key).await {
        return Ok(Json(json!({ "unread": count })));
    }

    let count = state.notifications.unread_count(actor.user_id).await?;
    // Cache fill is best-effort; the database count already answered.
    let _ = state.redis.set_unread_count(&cache_key, count).await;
    Ok(Json(json!({ "unread": count })))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state.notifications.mark_read(actor.user_id, id).await?;
    if !updated {
        return Err(marina_core::CoreError::not_found("notification").into());
    }
    let _ = state.redis.clear_unread_count(&actor.user_id.to_string()).await;
    Ok(Json(json!({ "read": true })))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state.notifications.mark_all_read(actor.user_id).await?;
    let _ = state.redis.clear_unread_count(&actor.user_id.to_string()).await;
    Ok(Json(json!({ "marked": updated })))
}

/// Live push: each client holds an SSE subscription filtered to its own
/// events. Missed events are still in the persisted inbox.
async fn notification_stream(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.hub.subscribe();
    let user_id = actor.user_id;

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.user_id == user_id => {
                let payload = serde_json::to_string(&event).unwrap_or_default();
                Some(Ok(Event::default().event(event.kind.as_str()).data(payload)))
            }
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
