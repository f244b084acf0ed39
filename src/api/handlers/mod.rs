//! REST endpoint handlers organized by resource.

pub mod system;
pub mod workers;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().merge(workers::routes())
}
