//! HTTP server command

use std::sync::Arc;

use anyhow::Result;

use crate::config::VerdictConfig;
use crate::engine::{InferenceService, LoadError};
use crate::server;

/// Start the inference server.
///
/// Missing model files are not fatal: the server starts degraded and reports
/// the model as unavailable until a reload succeeds.
pub async fn serve(
    mut config: VerdictConfig,
    port: Option<u16>,
    host: Option<String>,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    let service = Arc::new(InferenceService::from_config(&config));
    tracing::info!("Model source: {}", service.manager().source());

    match service.load().await {
        Ok(()) => tracing::info!("Model ready"),
        Err(LoadError::ResourcesMissing { .. }) => {
            tracing::warn!("Starting without a model; upload the files, then reload")
        }
        Err(e) => tracing::error!("Starting without a model: {}", e),
    }

    tracing::info!("Starting server at http://{}", config.server.addr());
    server::start(service, config.server).await?;

    Ok(())
}
