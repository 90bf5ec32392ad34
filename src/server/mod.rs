//! HTTP server for text classification
//!
//! Thin JSON layer over [`InferenceService`]; all lifecycle and concurrency
//! handling lives in the engine.

mod handlers;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::engine::InferenceService;

pub use handlers::AppState;
pub use routes::api_routes;

/// Build the application with its middleware stack
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .merge(api_routes())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// Start the HTTP server and run until Ctrl-C.
///
/// On shutdown the listener stops accepting connections, in-flight requests
/// finish, and the service drains and releases its model.
pub async fn start(service: Arc<InferenceService>, config: ServerConfig) -> Result<()> {
    let state = Arc::new(AppState::new(Arc::clone(&service)));
    let app = router(state, &config);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /v1/predict - Classify text");
    tracing::info!("  GET  /v1/health - Health check");
    tracing::info!("  GET  /v1/model-info - Model description");
    tracing::info!("  GET  /v1/model-status - Model availability");
    tracing::info!("  POST /v1/reload-model - Reload model files");
    tracing::info!("  POST /v1/train?dataPath=<file> - Train a decision tree");
    tracing::info!("  POST /v1/train/classify?dataPath=<file>&instancesPath=<file> - Classify");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, releasing model");
    service.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        // Without a signal handler, keep serving
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
