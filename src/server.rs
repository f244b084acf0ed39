//! Router composition for the coordinator.

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::{echo_ws_handler, events_ws_handler, worker_ws_handler};

/// Builds the complete coordinator application: REST API, health, and the
/// `/ws`, `/events` and `/echo` sockets.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(worker_ws_handler))
        .route("/events", get(events_ws_handler))
        .route("/echo", get(echo_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::domain::PendingCommand;
    use crate::protocol::{ExecutionResult, WorkerId};

    fn state() -> AppState {
        let config = CoordinatorConfig {
            command_timeout: Duration::from_millis(500),
            ..CoordinatorConfig::default()
        };
        AppState::new(&config)
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), 1 << 20).await else {
            panic!("body read failed");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap_or_default()
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_default()
    }

    fn answer_with(mut queue: mpsc::Receiver<PendingCommand>, result: ExecutionResult) {
        tokio::spawn(async move {
            while let Some(pending) = queue.recv().await {
                let _ = pending.reply.send(result.clone());
            }
        });
    }

    #[tokio::test]
    async fn health_reports_worker_count() {
        let state = state();
        let (_, _queue) = state.worker_service.open_session(WorkerId::Number(1)).await;
        let (status, body) = call(build_app(state), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status"), Some(&json!("healthy")));
        assert_eq!(body.get("workers"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn unknown_worker_is_404_with_code() {
        let (status, body) = call(build_app(state()), get("/api/v1/workers/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let code = body.get("error").and_then(|e| e.get("code"));
        assert_eq!(code, Some(&json!(2001)));
    }

    #[tokio::test]
    async fn list_is_paginated() {
        let state = state();
        let mut queues = Vec::new();
        for id in 1..=3 {
            let (_, queue) = state.worker_service.open_session(WorkerId::Number(id)).await;
            queues.push(queue);
        }
        let request = get("/api/v1/workers?page=2&per_page=2");
        let (status, body) = call(build_app(state), request).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<Value> = body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|w| w.get("worker_id").cloned()).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![json!(3)]);
        assert_eq!(
            body.get("pagination"),
            Some(&json!({"page": 2, "per_page": 2, "total": 3, "total_pages": 2}))
        );
    }

    #[tokio::test]
    async fn command_round_trip_mirrors_status() {
        let state = state();
        let (_, queue) = state.worker_service.open_session(WorkerId::Number(7)).await;
        answer_with(queue, ExecutionResult::success(json!(7)));

        let request = post("/api/v1/workers/7/commands", &json!({"command": "return true, 7"}));
        let (status, body) = call(build_app(state), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"worker_id": 7, "status": true, "data": 7}));
    }

    #[tokio::test]
    async fn refused_move_is_422_with_detail() {
        let state = state();
        let (_, queue) = state.worker_service.open_session(WorkerId::from("miner")).await;
        answer_with(queue, ExecutionResult::error("Out of fuel"));

        let request = post("/api/v1/workers/miner/move", &json!({"direction": "forward"}));
        let (status, body) = call(build_app(state), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let details = body.get("error").and_then(|e| e.get("details"));
        assert_eq!(details, Some(&json!("Out of fuel")));
    }

    #[tokio::test]
    async fn successful_move_returns_position() {
        let state = state();
        let (_, queue) = state.worker_service.open_session(WorkerId::Number(2)).await;
        answer_with(queue, ExecutionResult::success(json!(true)));

        let request = post("/api/v1/workers/2/move", &json!({"direction": "up"}));
        let (status, body) = call(build_app(state), request).await;
        assert_eq!(status, StatusCode::OK);
        let location = body.get("position").and_then(|p| p.get("location"));
        assert_eq!(location, Some(&json!({"x": 0, "y": 1, "z": 0})));
    }

    #[tokio::test]
    async fn delete_kicks_worker() {
        let state = state();
        let (_, _queue) = state.worker_service.open_session(WorkerId::Number(5)).await;
        let app = build_app(state);

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/v1/workers/5")
            .body(Body::empty())
            .unwrap_or_default();
        let (status, _) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(app, get("/api/v1/workers/5")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
