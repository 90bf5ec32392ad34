//! Error taxonomy for the serving core
//!
//! Every failure mode is a distinct variant so callers can branch on the
//! kind of failure without inspecting messages.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to construct or install a model resource
#[derive(Debug, Error)]
pub enum LoadError {
    /// One or both resource files do not exist (expected before first upload)
    #[error("model resources missing: {}", display_paths(.missing))]
    ResourcesMissing { missing: Vec<PathBuf> },

    /// The files exist but could not be turned into a working resource
    #[error("failed to construct model resource: {0}")]
    ConstructionFailed(#[source] anyhow::Error),

    /// Another load or reload is already running
    #[error("a model load or reload is already in progress")]
    InProgress,

    /// The manager has been shut down
    #[error("model manager is closed")]
    Closed,
}

/// Reload failures share the load taxonomy
pub type ReloadError = LoadError;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure to borrow the current model resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("model is not loaded")]
    NotLoaded,

    #[error("model manager is closed")]
    Closed,
}

/// Caller input rejected before the model is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("text is required")]
    Blank,

    #[error("text is too long ({chars} characters, maximum {max})")]
    TooLong { chars: usize, max: usize },
}

/// Failure while running the model
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("tokenization failed: {0}")]
    Tokenizer(#[source] anyhow::Error),

    #[error("inference engine failed: {0}")]
    Engine(#[source] anyhow::Error),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a single prediction
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Errors surfaced by the serving facade
#[derive(Debug, Error)]
pub enum ServingError {
    /// No model is loaded; the service is up but degraded
    #[error("AI model not loaded. Please upload model.onnx and tokenizer.json.")]
    ModelUnavailable,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("model reload failed: {0}")]
    Reload(#[source] LoadError),

    #[error("service is shutting down")]
    Closed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AccessError> for ServingError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotLoaded => ServingError::ModelUnavailable,
            AccessError::Closed => ServingError::Closed,
        }
    }
}

impl From<PredictError> for ServingError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ServingError::Validation(e),
            PredictError::Inference(e) => ServingError::Inference(e),
        }
    }
}

impl From<LoadError> for ServingError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Closed => ServingError::Closed,
            other => ServingError::Reload(other),
        }
    }
}
