//! Task submission and inspection.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hcm_core::TaskId;
use hcm_task::TaskRecord;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Request to run an Action.
#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    /// Registered Action name.
    pub name: String,
    /// Action parameters.
    #[serde(default)]
    pub params: Value,
}

/// Accepted task.
#[derive(Debug, Serialize)]
pub struct SubmitTaskResponse {
    /// Id to poll.
    pub task_id: TaskId,
}

/// Result of a cancellation request.
#[derive(Debug, Serialize)]
pub struct CancelTaskResponse {
    /// Task id.
    pub task_id: TaskId,
    /// Whether the request reached a task that had not finished yet.
    pub cancelled: bool,
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid task id: {raw}")))
}

/// Submit a task.
///
/// Unknown Actions and parameters that fail validation are rejected here;
/// no task is created for them.
pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(request): Json<SubmitTaskRequest>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), ApiError> {
    let handle = state.executor.submit(&request.name, request.params).await?;

    tracing::info!(
        task_id = %handle.id(),
        action = %request.name,
        service = %auth.service_name,
        "Task accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTaskResponse { task_id: handle.id() }),
    ))
}

/// Current record of a task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    let id = parse_task_id(&id)?;
    state
        .executor
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task not found: {id}")))
}

/// Request cancellation of a task.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(id): Path<String>,
) -> Result<Json<CancelTaskResponse>, ApiError> {
    let id = parse_task_id(&id)?;
    if state.executor.get(&id).await.is_none() {
        return Err(ApiError::NotFound(format!("task not found: {id}")));
    }

    let cancelled = state.executor.cancel(&id).await;

    Ok(Json(CancelTaskResponse {
        task_id: id,
        cancelled,
    }))
}
