//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Registered Actions.
    pub actions: usize,
    /// Tasks pending or running.
    pub active_tasks: usize,
}

/// Health check endpoint. Needs no API key.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        actions: state.executor.registry().len(),
        active_tasks: state.executor.active().await.len(),
    })
}
