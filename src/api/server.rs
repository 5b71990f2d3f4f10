//! SheetForge API Server implementation
//!
//! HTTP surface over a running engine worker: submit edit batches, read the
//! published snapshot, inspect single cells.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::engine::{spawn_engine, EngineHandle};
use crate::types::EngineConfig;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            engine: EngineConfig::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub engine: EngineHandle,
}

/// Build the router around an engine handle
pub fn build_router(engine: EngineHandle) -> Router {
    let state = Arc::new(AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/api/v1/snapshot", get(handlers::snapshot))
        .route("/api/v1/edits", post(handlers::edits))
        .route("/api/v1/cells/:key", get(handlers::cell))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sheetforge_server=info,royalbit_sheetforge=info,tower_http=info".into()
            }),
        )
        .init();

    let (engine, worker) = spawn_engine(config.engine)?;
    let app = build_router(engine);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("SheetForge API Server starting on http://{}", addr);
    info!(
        "   Table: {}x{}, endpoints: /api/v1/edits, /api/v1/snapshot, /api/v1/cells/:key",
        config.engine.width, config.engine.height
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // the router held the last handle, so the worker drains and exits
    worker.await?;
    info!("SheetForge API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, stopping server...");
}
