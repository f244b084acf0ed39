//! Worker handlers: list, inspect, kick, command, move, locate.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CommandRequest, CommandResponse, MoveRequest, PaginationParams, PositionResponse,
    WorkerListResponse,
};
use crate::app_state::AppState;
use crate::error::CoordinatorError;
use crate::protocol::WorkerId;

/// `GET /api/v1/workers` — Registered workers, ordered by identity.
pub async fn list_workers(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let summaries = state.worker_service.list_workers().await;
    let (data, pagination) = params.paginate(summaries);
    Json(WorkerListResponse { data, pagination })
}

/// `GET /api/v1/workers/{id}` — One worker's session summary.
///
/// # Errors
///
/// Returns [`CoordinatorError::WorkerNotFound`] if the worker is not
/// registered.
pub async fn get_worker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoordinatorError> {
    let worker_id = parse_worker_id(&id)?;
    let summary = state.worker_service.get_worker(&worker_id).await?;
    Ok(Json(summary))
}

/// `DELETE /api/v1/workers/{id}` — Close a worker's session.
///
/// # Errors
///
/// Returns [`CoordinatorError::WorkerNotFound`] if the worker is not
/// registered.
pub async fn delete_worker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoordinatorError> {
    let worker_id = parse_worker_id(&id)?;
    state.worker_service.disconnect(&worker_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/workers/{id}/commands` — Run a command and return the
/// worker's status.
///
/// A failure status is still a `200`: the command was delivered and
/// answered, and the body carries `status: false` with the detail.
///
/// # Errors
///
/// Returns [`CoordinatorError`] if the command cannot be delivered or is
/// not answered in time.
pub async fn send_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<impl IntoResponse, CoordinatorError> {
    let worker_id = parse_worker_id(&id)?;
    let result = state
        .worker_service
        .send_command(&worker_id, req.command)
        .await?;
    Ok(Json(CommandResponse::new(worker_id, result)))
}

/// `POST /api/v1/workers/{id}/move` — Move or turn the worker's turtle.
///
/// # Errors
///
/// Returns [`CoordinatorError::CommandFailed`] (422) with the worker's
/// reason if the turtle refuses, plus the delivery errors of
/// [`send_command`].
pub async fn move_worker(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> Result<impl IntoResponse, CoordinatorError> {
    let worker_id = parse_worker_id(&id)?;
    let position = state
        .worker_service
        .move_turtle(&worker_id, req.direction)
        .await?;
    Ok(Json(PositionResponse {
        worker_id,
        position,
    }))
}

/// `POST /api/v1/workers/{id}/locate` — Sync the tracked location from GPS.
///
/// # Errors
///
/// Same as [`move_worker`].
pub async fn locate_worker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, CoordinatorError> {
    let worker_id = parse_worker_id(&id)?;
    let position = state.worker_service.locate_turtle(&worker_id).await?;
    Ok(Json(PositionResponse {
        worker_id,
        position,
    }))
}

fn parse_worker_id(raw: &str) -> Result<WorkerId, CoordinatorError> {
    if raw.trim().is_empty() {
        return Err(CoordinatorError::InvalidRequest(
            "worker id must not be empty".to_string(),
        ));
    }
    Ok(WorkerId::from(raw))
}

/// Worker routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/workers", get(list_workers))
        .route("/workers/{id}", get(get_worker).delete(delete_worker))
        .route("/workers/{id}/commands", post(send_command))
        .route("/workers/{id}/move", post(move_worker))
        .route("/workers/{id}/locate", post(locate_worker))
}
