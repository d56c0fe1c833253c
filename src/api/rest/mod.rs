pub mod drivers;
pub mod notifications;
pub mod reservations;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(reservations::router())
        .merge(drivers::router())
        .merge(notifications::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    reservations: usize,
    drivers: usize,
    notifications: usize,
    unread: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let feed = state.feed.read().await;

    Json(HealthResponse {
        status: "ok",
        reservations: state.store.reservation_count(),
        drivers: state.store.driver_count(),
        notifications: feed.len(),
        unread: feed.unread_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
