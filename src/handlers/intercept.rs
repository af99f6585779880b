//! Message interception handler

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::{AppState, AppResult};
use crate::interceptor::{InterceptOutcome, Message};

#[derive(Debug, Deserialize, Validate)]
pub struct InterceptRequest {
    #[validate(length(min = 1, max = 255))]
    pub sender: String,
    #[validate(length(max = 255))]
    pub recipient: Option<String>,
    pub content: String,
}

/// Score a message and enforce the decision
pub async fn intercept(
    State(state): State<AppState>,
    Json(req): Json<InterceptRequest>,
) -> AppResult<Json<InterceptOutcome>> {
    let fence = state.fence()?;
    req.validate()?;

    let message = Message {
        sender: req.sender,
        recipient: req.recipient,
        content: req.content,
    };

    Ok(Json(fence.interceptor.intercept(&message).await))
}
