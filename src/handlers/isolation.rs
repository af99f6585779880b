//! Manual isolation handlers

use axum::{extract::{State, Path}, Json};
use serde::Deserialize;
use validator::Validate;

use super::ActionResponse;
use crate::{AppState, AppResult, AppError, FenceError};

#[derive(Debug, Deserialize, Validate)]
pub struct IsolateRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Isolate an agent
pub async fn isolate(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    Json(req): Json<IsolateRequest>,
) -> AppResult<Json<ActionResponse>> {
    let fence = state.fence()?;
    req.validate()?;

    fence
        .isolation
        .isolate(&agent, &req.reason)
        .await
        .map_err(|e| enforcement_error(e, "Failed to isolate agent"))?;

    let message = format!("Agent {} isolated", agent);
    Ok(Json(ActionResponse::ok(agent, message)))
}

/// Release an isolated agent
pub async fn release(
    State(state): State<AppState>,
    Path(agent): Path<String>,
) -> AppResult<Json<ActionResponse>> {
    let fence = state.fence()?;

    fence
        .isolation
        .release(&agent)
        .await
        .map_err(|e| enforcement_error(e, "Failed to release agent"))?;

    let message = format!("Agent {} released", agent);
    Ok(Json(ActionResponse::ok(agent, message)))
}

fn enforcement_error(err: FenceError, failure: &str) -> AppError {
    match err {
        FenceError::Persistence(e) => {
            tracing::error!("{}: {}", failure, e);
            AppError::InternalError(failure.to_string())
        }
        other => other.into(),
    }
}
