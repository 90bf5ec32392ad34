//! Serving facade
//!
//! [`InferenceService`] is what the HTTP layer and CLI talk to. It combines
//! the lifecycle manager with the prediction pipeline and moves blocking
//! work (inference, reload, drain) off the async runtime.

use std::sync::Arc;
use std::time::Duration;

use crate::config::VerdictConfig;
use crate::engine::lifecycle::{LifecycleState, ModelManager};
use crate::engine::pipeline::{Pipeline, PredictionResult};
use crate::engine::{InferenceError, LoadError, ServingError};
use crate::loader::{OnnxLoader, ResourceLoader};

/// Default bound on a single inference call
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Serving facade over the current model
pub struct InferenceService {
    manager: Arc<ModelManager>,
    pipeline: Arc<Pipeline>,
    timeout: Duration,
}

impl InferenceService {
    pub fn new(manager: Arc<ModelManager>, pipeline: Pipeline) -> Self {
        Self {
            manager,
            pipeline: Arc::new(pipeline),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build the service described by `config` with the ONNX loader.
    ///
    /// The model is not loaded yet; call [`InferenceService::load`].
    pub fn from_config(config: &VerdictConfig) -> Self {
        let loader: Arc<dyn ResourceLoader> = Arc::new(OnnxLoader::from_config(&config.model));
        let manager = ModelManager::new(loader)
            .with_drain_poll(Duration::from_millis(config.inference.drain_poll_ms));
        let pipeline = Pipeline::from_config(&config.inference, &config.model.labels);

        Self::new(Arc::new(manager), pipeline)
            .with_timeout(Duration::from_millis(config.inference.timeout_ms))
    }

    /// Set the default inference timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Lifecycle state; never blocks
    pub fn status(&self) -> LifecycleState {
        self.manager.status()
    }

    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    /// Classify `text` with the default timeout
    pub async fn predict(&self, text: String) -> Result<PredictionResult, ServingError> {
        self.predict_with_timeout(text, self.timeout).await
    }

    /// Classify `text`, giving up after `timeout`.
    ///
    /// A timed-out inference keeps running on its blocking thread and keeps
    /// its borrow of the model until it finishes; other callers are unaffected.
    pub async fn predict_with_timeout(
        &self,
        text: String,
        timeout: Duration,
    ) -> Result<PredictionResult, ServingError> {
        // Bad input is reported even when no model is loaded
        self.pipeline.validate(&text)?;

        let manager = Arc::clone(&self.manager);
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::task::spawn_blocking(move || {
            manager.with_current(|resource| pipeline.predict(resource, &text))
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(prediction))) => Ok(prediction?),
            Ok(Ok(Err(access))) => {
                tracing::warn!("Prediction requested but model is not available: {}", access);
                Err(access.into())
            }
            Ok(Err(join)) => Err(ServingError::Internal(format!(
                "prediction task failed: {}",
                join
            ))),
            Err(_) => {
                tracing::warn!("Prediction timed out after {:?}", timeout);
                Err(InferenceError::Timeout(timeout).into())
            }
        }
    }

    /// Initial load; missing resources leave the service up but unavailable
    pub async fn load(&self) -> Result<(), LoadError> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.load())
            .await
            .map_err(|e| LoadError::ConstructionFailed(anyhow::anyhow!("load task failed: {}", e)))?
    }

    /// Replace the current model with a fresh read of the resource files
    pub async fn reload(&self) -> Result<(), ServingError> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.reload())
            .await
            .map_err(|e| ServingError::Internal(format!("reload task failed: {}", e)))?
            .map_err(ServingError::from)
    }

    /// Drain in-flight predictions, release the model and close
    pub async fn shutdown(&self) {
        let manager = Arc::clone(&self.manager);
        if let Err(e) = tokio::task::spawn_blocking(move || manager.shutdown()).await {
            tracing::error!("Shutdown task failed: {}", e);
        }
    }
}
