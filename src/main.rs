//! NeuroFence server
//!
//! Serves the interception API over HTTP.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurofence::{
    config::Config,
    embedding::HashingEmbedder,
    store,
    AppState, Fence,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(&config);

    tracing::info!("NeuroFence starting ({})...", config.environment);
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // A failed bootstrap still serves /health; everything else answers 503
    let fence = match bootstrap(&config).await {
        Ok(fence) => Some(Arc::new(fence)),
        Err(e) => {
            tracing::error!("Initialization failed: {:#}", e);
            None
        }
    };

    let state = AppState::new(config.clone(), fence.clone());
    let app = neurofence::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.api_host, config.api_port)
        .parse()
        .context("invalid API_HOST/API_PORT")?;
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(fence) = fence {
        fence.store.close().await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("neurofence={},tower_http=info", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn bootstrap(config: &Config) -> anyhow::Result<Fence> {
    if config.is_production() && config.uses_memory_store() {
        tracing::warn!("In-memory store selected in production; isolations and audit rows are lost on restart");
    }

    let store = store::connect(config)
        .await
        .context("failed to open persistence store")?;

    let embedder = Arc::new(HashingEmbedder::new(
        config.embedding_model.clone(),
        config.embedding_dimension,
    ));

    Fence::initialize(config, store, embedder)
        .await
        .context("failed to initialize components")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
