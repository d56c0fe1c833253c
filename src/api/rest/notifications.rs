use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(feed_snapshot))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", post(mark_read))
}

#[derive(Serialize)]
struct FeedResponse {
    notifications: Vec<Notification>,
    unread_count: usize,
}

async fn feed_snapshot(State(state): State<Arc<AppState>>) -> Json<FeedResponse> {
    let feed = state.feed.read().await;

    Json(FeedResponse {
        notifications: feed.snapshot(),
        unread_count: feed.unread_count(),
    })
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FeedResponse>, AppError> {
    let mut feed = state.feed.write().await;

    if !feed.mark_read(&id) {
        return Err(AppError::NotFound(format!("notification {id} not found")));
    }
    state.metrics.feed_unread.set(feed.unread_count() as i64);

    Ok(Json(FeedResponse {
        notifications: feed.snapshot(),
        unread_count: feed.unread_count(),
    }))
}

async fn mark_all_read(State(state): State<Arc<AppState>>) -> Json<FeedResponse> {
    let mut feed = state.feed.write().await;

    feed.mark_all_read();
    state.metrics.feed_unread.set(0);

    Json(FeedResponse {
        notifications: feed.snapshot(),
        unread_count: feed.unread_count(),
    })
}
