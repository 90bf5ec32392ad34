//! Model resource loading
//!
//! A model resource is built from two files:
//! - an ONNX model artifact (`model.onnx`)
//! - a HuggingFace tokenizer definition (`tokenizer.json`)
//!
//! Missing files are an expected condition (nothing uploaded yet) and are
//! reported separately from files that exist but fail to load.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::ModelConfig;
use crate::engine::session::OnnxSession;
use crate::engine::{LoadError, ResourceParts};
use crate::tokenizer::{HfTokenizer, TextTokenizer};

/// Source of model resources for the lifecycle manager
///
/// Each call re-reads the underlying files from scratch.
pub trait ResourceLoader: Send + Sync {
    /// Build a fresh session and tokenizer
    fn load(&self) -> Result<ResourceParts, LoadError>;

    /// Human-readable description of where resources come from
    fn describe(&self) -> String;
}

/// Locations of the two resource files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ResourcePaths {
    pub fn new(model_path: impl Into<PathBuf>, tokenizer_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            tokenizer_path: tokenizer_path.into(),
        }
    }

    /// Paths that do not currently point at a file
    pub fn missing(&self) -> Vec<PathBuf> {
        [&self.model_path, &self.tokenizer_path]
            .into_iter()
            .filter(|p| !p.is_file())
            .cloned()
            .collect()
    }

    /// Check that both files exist
    pub fn locate(&self) -> Result<(), LoadError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoadError::ResourcesMissing { missing })
        }
    }
}

/// Loads an ONNX Runtime session and a HuggingFace tokenizer from disk
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    paths: ResourcePaths,
    output_name: String,
    intra_threads: usize,
}

impl OnnxLoader {
    pub fn new(paths: ResourcePaths) -> Self {
        Self {
            paths,
            output_name: "logits".to_string(),
            intra_threads: 1,
        }
    }

    /// Create a loader from the model section of the configuration
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(ResourcePaths::new(
            config.model_path.clone(),
            config.tokenizer_path.clone(),
        ))
        .with_output_name(&config.output_name)
        .with_intra_threads(config.intra_threads)
    }

    /// Set the name of the logits output
    pub fn with_output_name(mut self, name: &str) -> Self {
        self.output_name = name.to_string();
        self
    }

    /// Set the number of ONNX Runtime intra-op threads
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self
    }

    fn construct(&self, model_path: &Path, tokenizer_path: &Path) -> anyhow::Result<ResourceParts> {
        let session = OnnxSession::from_file(model_path, &self.output_name, self.intra_threads)
            .context("Failed to build inference session")?;
        let tokenizer =
            HfTokenizer::from_file(tokenizer_path).context("Failed to build tokenizer")?;
        tracing::debug!(
            "Tokenizer {} loaded ({} tokens)",
            tokenizer_path.display(),
            tokenizer.vocab_size()
        );
        Ok(ResourceParts::new(session, tokenizer))
    }
}

impl ResourceLoader for OnnxLoader {
    fn load(&self) -> Result<ResourceParts, LoadError> {
        self.paths.locate()?;
        self.construct(&self.paths.model_path, &self.paths.tokenizer_path)
            .map_err(LoadError::ConstructionFailed)
    }

    fn describe(&self) -> String {
        format!(
            "model={}, tokenizer={}",
            self.paths.model_path.display(),
            self.paths.tokenizer_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reports_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ResourcePaths::new(
            dir.path().join("model.onnx"),
            dir.path().join("tokenizer.json"),
        );
        assert_eq!(paths.missing().len(), 2);

        match paths.locate() {
            Err(LoadError::ResourcesMissing { missing }) => assert_eq!(missing.len(), 2),
            other => panic!("expected ResourcesMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_reports_only_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        std::fs::write(&model, b"stub").unwrap();
        let paths = ResourcePaths::new(&model, dir.path().join("tokenizer.json"));

        assert_eq!(paths.missing(), vec![dir.path().join("tokenizer.json")]);
    }

    #[test]
    fn test_directory_is_not_a_resource_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ResourcePaths::new(dir.path(), dir.path());
        assert_eq!(paths.missing().len(), 2);
    }

    #[test]
    fn test_loader_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxLoader::new(ResourcePaths::new(
            dir.path().join("model.onnx"),
            dir.path().join("tokenizer.json"),
        ));
        assert!(matches!(
            loader.load(),
            Err(LoadError::ResourcesMissing { .. })
        ));
    }

    #[test]
    fn test_loader_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        let tokenizer = dir.path().join("tokenizer.json");
        std::fs::write(&model, b"not an onnx graph").unwrap();
        std::fs::write(&tokenizer, b"{}").unwrap();

        let loader = OnnxLoader::new(ResourcePaths::new(&model, &tokenizer));
        assert!(matches!(
            loader.load(),
            Err(LoadError::ConstructionFailed(_))
        ));
    }

    #[test]
    fn test_describe_names_paths() {
        let loader = OnnxLoader::new(ResourcePaths::new("w/model.onnx", "w/tokenizer.json"));
        let desc = loader.describe();
        assert!(desc.contains("w/model.onnx"));
        assert!(desc.contains("w/tokenizer.json"));
    }
}
