//! CLI commands

mod classify;
mod predict;
mod serve;
mod status;
mod train;

pub use classify::classify;
pub use predict::predict;
pub use serve::serve;
pub use status::status;
pub use train::train;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::VerdictConfig;

/// Verdict - inference server for binary text classification
#[derive(Parser)]
#[command(name = "verdict")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP inference server
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,
    },

    /// Classify a single text without starting a server
    Predict {
        #[command(flatten)]
        model: ModelArgs,

        /// Text to classify
        text: String,
    },

    /// Check that the model and tokenizer files exist and load
    Status {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Fit a decision tree on an ARFF or CSV dataset and print it
    Train {
        /// Dataset file (.arff or .csv, class in the last column)
        data_path: PathBuf,
    },

    /// Fit a decision tree and print a class label for each instance
    Classify {
        /// Training dataset file (.arff or .csv, class in the last column)
        data_path: PathBuf,

        /// Rows to classify, with the same columns (defaults to the training file)
        #[arg(long)]
        instances: Option<PathBuf>,
    },
}

/// Options shared by commands that load the model
#[derive(Args, Debug, Default)]
pub struct ModelArgs {
    /// Configuration file (.yaml, .yml or .json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// ONNX model file (overrides the config file)
    #[arg(long, short)]
    pub model: Option<PathBuf>,

    /// tokenizer.json file (overrides the config file)
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,
}

impl ModelArgs {
    /// Load the configuration file, if any, and apply command line overrides
    pub fn resolve(&self) -> Result<VerdictConfig> {
        let mut config = match &self.config {
            Some(path) => VerdictConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => VerdictConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model.model_path = model.clone();
        }
        if let Some(tokenizer) = &self.tokenizer {
            config.model.tokenizer_path = tokenizer.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "verdict",
            "serve",
            "--model",
            "/srv/model.onnx",
            "--port",
            "9000",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve { model, port, host } => {
                assert_eq!(model.model, Some(PathBuf::from("/srv/model.onnx")));
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdict.yaml");
        std::fs::write(
            &path,
            "model:\n  model_path: /a/model.onnx\n  tokenizer_path: /a/tokenizer.json\n",
        )
        .unwrap();

        let args = ModelArgs {
            config: Some(path),
            model: None,
            tokenizer: Some(PathBuf::from("/b/tokenizer.json")),
        };
        let config = args.resolve().unwrap();

        assert_eq!(config.model.model_path, PathBuf::from("/a/model.onnx"));
        assert_eq!(config.model.tokenizer_path, PathBuf::from("/b/tokenizer.json"));
    }

    #[test]
    fn test_resolve_without_config_file() {
        let config = ModelArgs::default().resolve().unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_resolve_missing_config_file() {
        let args = ModelArgs {
            config: Some(PathBuf::from("/nonexistent/verdict.yaml")),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
