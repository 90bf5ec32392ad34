//! Verdict - inference server for binary text classification
//!
//! Verdict serves a pretrained two-class text classifier: text is tokenized
//! with a HuggingFace tokenizer, run through an ONNX model, and the two
//! output logits are turned into class probabilities.
//!
//! # Architecture
//!
//! - **engine**: model lifecycle (load, hot reload with drain-then-release,
//!   shutdown), the prediction pipeline and the serving facade
//! - **loader / tokenizer**: adapters over ONNX Runtime and `tokenizers`
//! - **server / cli**: HTTP and command line front ends
//! - **training**: standalone decision-tree utility
//!
//! # Example
//!
//! ```bash
//! # Start server with files from ./weights
//! verdict serve --port 8080
//!
//! # One-off prediction
//! verdict predict "I love this product"
//!
//! # Train a decision tree
//! verdict train data/weather.arff
//! verdict classify data/weather.arff --instances data/new-days.csv
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod loader;
pub mod server;
pub mod tokenizer;
pub mod training;

// Re-export key types
pub use config::{InferenceConfig, ModelConfig, ServerConfig, VerdictConfig};
pub use engine::{InferenceService, LifecycleState, ModelManager, PredictionResult, ServingError};
pub use loader::{OnnxLoader, ResourceLoader, ResourcePaths};
