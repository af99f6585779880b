//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
    detector: &'static str,
    isolation_engine: &'static str,
    interceptor: &'static str,
    store: Option<String>,
    store_reachable: bool,
}

/// Always answers, even when initialization failed
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let readiness = |ready: bool| if ready { "ready" } else { "not_ready" };

    let (store, store_reachable) = match state.fence.as_deref() {
        Some(fence) => (
            Some(fence.store.name().to_string()),
            fence.store.ping().await.is_ok(),
        ),
        None => (None, false),
    };

    let ready = state.fence.is_some();
    Json(HealthResponse {
        status: if ready { "healthy" } else { "not_ready" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        detector: readiness(ready),
        isolation_engine: readiness(ready),
        interceptor: readiness(ready),
        store,
        store_reachable,
    })
}
