//! Baseline learning handler

use axum::{extract::{State, Path}, Json};
use serde::{Deserialize, Serialize};

use crate::{AppState, AppResult, AppError};

#[derive(Debug, Deserialize)]
pub struct UpdateBaselineRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateBaselineResponse {
    pub success: bool,
    pub persisted: bool,
    pub agent: String,
    pub message: String,
}

/// Fold a known-good message into the agent's baseline
pub async fn update(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    Json(req): Json<UpdateBaselineRequest>,
) -> AppResult<Json<UpdateBaselineResponse>> {
    let fence = state.fence()?;

    let result = fence.interceptor.update_agent_baseline(&agent, &req.content).await;
    if !result.applied {
        return Err(AppError::InternalError("Failed to update baseline".to_string()));
    }

    Ok(Json(UpdateBaselineResponse {
        success: true,
        persisted: result.persisted,
        message: format!("Baseline updated for {}", agent),
        agent,
    }))
}
