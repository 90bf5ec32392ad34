//! Model resource settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable that relocates the default weights directory
pub const WEIGHTS_DIR_ENV: &str = "VERDICT_WEIGHTS_DIR";

/// Mapping from logit index to class.
///
/// This depends on how the artifact was trained, so it is configuration
/// rather than a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Index of the negative-class logit
    #[serde(default)]
    pub negative_index: usize,

    /// Index of the positive-class logit
    #[serde(default = "default_positive_index")]
    pub positive_index: usize,
}

fn default_positive_index() -> usize {
    1
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            negative_index: 0,
            positive_index: default_positive_index(),
        }
    }
}

/// Where the model artifact and tokenizer live, and how to run them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// ONNX model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// HuggingFace tokenizer definition
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,

    /// Name of the logits output tensor
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Logit index to class mapping
    #[serde(default)]
    pub labels: LabelConfig,

    /// ONNX Runtime intra-op threads
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

/// Directory holding `model.onnx` and `tokenizer.json`
pub fn weights_dir() -> PathBuf {
    std::env::var(WEIGHTS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("weights"))
}

fn default_model_path() -> PathBuf {
    weights_dir().join("model.onnx")
}

fn default_tokenizer_path() -> PathBuf {
    weights_dir().join("tokenizer.json")
}

fn default_output_name() -> String {
    "logits".to_string()
}

fn default_intra_threads() -> usize {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            tokenizer_path: default_tokenizer_path(),
            output_name: default_output_name(),
            labels: LabelConfig::default(),
            intra_threads: default_intra_threads(),
        }
    }
}
