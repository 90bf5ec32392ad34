//! Configuration system for verdict
//!
//! VerdictConfig groups the model resource locations, inference limits and
//! HTTP server settings. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration.

mod inference;
mod model;
mod server;

pub use inference::InferenceConfig;
pub use model::{weights_dir, LabelConfig, ModelConfig, WEIGHTS_DIR_ENV};
pub use server::ServerConfig;

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Verdict configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictConfig {
    /// Model artifact and tokenizer settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Inference-specific settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Server settings (only for `verdict serve`)
    #[serde(default)]
    pub server: ServerConfig,
}

impl VerdictConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, picking the parser from the file extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            other => bail!(
                "Unsupported config format '{}' (expected .yaml, .yml or .json)",
                other.unwrap_or("")
            ),
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let labels = &self.model.labels;
        if labels.negative_index == labels.positive_index {
            bail!(
                "model.labels: negative_index and positive_index must differ (both {})",
                labels.positive_index
            );
        }
        if labels.negative_index > 1 || labels.positive_index > 1 {
            bail!("model.labels: class indices must be 0 or 1 for a two-class model");
        }
        if self.inference.max_text_chars == 0 {
            bail!("inference.max_text_chars must be greater than zero");
        }
        if self.inference.timeout_ms == 0 {
            bail!("inference.timeout_ms must be greater than zero");
        }
        if self.inference.drain_poll_ms == 0 {
            bail!("inference.drain_poll_ms must be greater than zero");
        }
        // The HTTP timeout answers with an empty 408, so inference must give up first
        let request_timeout_ms = self.server.request_timeout_secs.saturating_mul(1000);
        if request_timeout_ms <= self.inference.timeout_ms {
            bail!(
                "server.request_timeout_secs ({}s) must exceed inference.timeout_ms ({}ms)",
                self.server.request_timeout_secs,
                self.inference.timeout_ms
            );
        }
        Ok(())
    }
}
