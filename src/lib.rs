//! NeuroFence
//!
//! Inline firewall for inter-agent messages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        NEUROFENCE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────────┐   ┌─────────────────┐ │
//! │  │  HTTP     │──▶│  Interceptor    │──▶│  Contamination  │ │
//! │  │  (Axum)   │   │  (decisions)    │   │  Detector       │ │
//! │  └───────────┘   └────────┬────────┘   └────────┬────────┘ │
//! │                           ▼                     │          │
//! │                  ┌─────────────────┐            │          │
//! │                  │  Isolation      │            │          │
//! │                  │  Registry       │            │          │
//! │                  └────────┬────────┘            │          │
//! │                           ▼                     ▼          │
//! │                  ┌──────────────────────────────────┐      │
//! │                  │  PersistenceStore (PostgreSQL)   │      │
//! │                  └──────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod detector;
pub mod embedding;
pub mod error;
pub mod fence;
pub mod handlers;
pub mod interceptor;
pub mod isolation;
pub mod models;
pub mod store;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use std::sync::Arc;

pub use config::Config;
pub use error::{AppError, AppResult, FenceError};
pub use fence::Fence;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` when startup initialization failed
    pub fence: Option<Arc<Fence>>,
}

impl AppState {
    pub fn new(config: Config, fence: Option<Arc<Fence>>) -> Self {
        Self { config, fence }
    }

    pub fn fence(&self) -> AppResult<&Fence> {
        self.fence
            .as_deref()
            .ok_or_else(|| FenceError::NotInitialized("fence".to_string()).into())
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/intercept", post(handlers::intercept::intercept))
        .route("/isolate/:agent", post(handlers::isolation::isolate))
        .route("/release/:agent", post(handlers::isolation::release))
        .route("/stats", get(handlers::stats::stats))
        .route("/forensics/:agent", get(handlers::stats::forensics))
        .route("/update-baseline/:agent", post(handlers::baseline::update))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
