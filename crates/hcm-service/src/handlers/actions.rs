//! Action discovery.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use hcm_task::ActionDescriptor;

use crate::auth::ServiceAuth;
use crate::state::AppState;

/// Registered Actions.
#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    /// Names and parameter schemas, sorted by name.
    pub actions: Vec<ActionDescriptor>,
}

/// List every Action a task may name, with its parameter schema.
pub async fn list_actions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Json<ActionsResponse> {
    Json(ActionsResponse {
        actions: state.executor.registry().describe(),
    })
}
