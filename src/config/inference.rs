//! Inference configuration settings

use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_MAX_TEXT_CHARS;

/// Inference-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Longest accepted input, in characters
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Bound on a single prediction, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How often a reload re-checks for in-flight predictions, in milliseconds
    #[serde(default = "default_drain_poll_ms")]
    pub drain_poll_ms: u64,
}

fn default_max_text_chars() -> usize {
    DEFAULT_MAX_TEXT_CHARS
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_drain_poll_ms() -> u64 {
    100
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
            timeout_ms: default_timeout_ms(),
            drain_poll_ms: default_drain_poll_ms(),
        }
    }
}
