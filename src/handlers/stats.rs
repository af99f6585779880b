//! Statistics and forensics handlers

use axum::{extract::{State, Path, Query}, Json};
use serde::Deserialize;

use crate::{AppState, AppResult};
use crate::isolation::{Forensics, IsolationStats, DEFAULT_FORENSICS_LIMIT};

const MAX_FORENSICS_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ForensicsQuery {
    pub limit: Option<i64>,
}

impl ForensicsQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_FORENSICS_LIMIT)
            .clamp(1, MAX_FORENSICS_LIMIT)
    }
}

/// Active and all-time isolation counters
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<IsolationStats>> {
    let fence = state.fence()?;
    Ok(Json(fence.interceptor.get_isolation_summary().await))
}

/// Blocked-message history and latest isolation event for one agent
pub async fn forensics(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    Query(query): Query<ForensicsQuery>,
) -> AppResult<Json<Forensics>> {
    let fence = state.fence()?;
    Ok(Json(fence.interceptor.get_forensics(&agent, query.limit()).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(ForensicsQuery { limit: None }.limit(), 50);
        assert_eq!(ForensicsQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(ForensicsQuery { limit: Some(10_000) }.limit(), 500);
        assert_eq!(ForensicsQuery { limit: Some(7) }.limit(), 7);
    }
}
