//! Core serving engine
//!
//! This module provides the inference serving core:
//! - ModelManager: Owns the current model (load/reload/status/shutdown)
//! - Pipeline: Runs one prediction against a borrowed model
//! - InferenceService: Facade combining both for the HTTP layer

mod error;
mod lifecycle;
mod pipeline;
mod resource;
mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{
    AccessError, InferenceError, LoadError, PredictError, ReloadError, ServingError,
    ValidationError,
};
pub use lifecycle::{LifecycleState, ModelManager, ResourceGuard};
pub use pipeline::{softmax2, Pipeline, PredictionResult, DEFAULT_MAX_TEXT_CHARS};
pub use resource::{ModelResource, ResourceParts};
pub use service::InferenceService;
pub use session::{InferenceSession, InputTensor, OnnxSession, OutputTensor};
