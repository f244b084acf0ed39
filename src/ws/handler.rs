//! Axum WebSocket upgrade handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::echo::run_echo;
use super::observer::run_observer;
use super::worker_connection::run_worker_connection;
use crate::app_state::AppState;

/// `GET /ws` — Worker session endpoint.
pub async fn worker_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let service = Arc::clone(&state.worker_service);
    let register_timeout = state.register_timeout;
    ws.on_upgrade(move |socket| run_worker_connection(socket, service, register_timeout))
}

/// `GET /events` — Observer event stream.
pub async fn events_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    let service = Arc::clone(&state.worker_service);
    ws.on_upgrade(move |socket| run_observer(socket, event_rx, service))
}

/// `GET /echo` — Echo socket.
pub async fn echo_ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(run_echo)
}
