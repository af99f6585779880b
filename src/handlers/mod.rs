//! HTTP handlers

pub mod health;
pub mod intercept;
pub mod isolation;
pub mod stats;
pub mod baseline;

use serde::Serialize;

/// Acknowledgement for enforcement and learning calls
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub agent: String,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(agent: String, message: String) -> Self {
        Self {
            success: true,
            agent,
            message,
        }
    }
}
