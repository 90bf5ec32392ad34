//! Inference engine adapter
//!
//! Runs a forward pass over named input tensors and returns named output
//! tensors. The ONNX Runtime implementation is [`OnnxSession`].

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

/// Name of the token id input
pub const INPUT_IDS: &str = "input_ids";
/// Name of the attention mask input
pub const ATTENTION_MASK: &str = "attention_mask";

/// Dense 2-D integer input tensor
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub name: &'static str,
    pub shape: [usize; 2],
    pub data: Vec<i64>,
}

impl InputTensor {
    /// Wrap a single sequence as a batch of one (shape `[1, N]`)
    pub fn batch_of_one(name: &'static str, data: Vec<i64>) -> Self {
        Self {
            name,
            shape: [1, data.len()],
            data,
        }
    }
}

/// Dense float output tensor
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Trait for engines that execute a loaded model
pub trait InferenceSession: Send + Sync {
    /// Run a forward pass
    ///
    /// Returns the requested output tensors. Implementations are free to
    /// serialize concurrent calls internally.
    fn run(&self, inputs: Vec<InputTensor>) -> Result<Vec<OutputTensor>>;
}

/// Boxed session type held by a loaded model resource
pub type BoxedSession = Box<dyn InferenceSession>;

/// ONNX Runtime session
///
/// `ort` requires exclusive access for `run`, so the session sits behind a
/// mutex. The surrounding resource is still immutable once published.
pub struct OnnxSession {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxSession {
    /// Build a session from an `.onnx` model file
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        output_name: &str,
        intra_threads: usize,
    ) -> Result<Self> {
        let path = path.as_ref();

        let session = Session::builder()
            .map_err(|e| anyhow!("Failed to create session builder: {}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Failed to set optimization level: {}", e))?
            .with_intra_threads(intra_threads.max(1))
            .map_err(|e| anyhow!("Failed to set intra-op threads: {}", e))?
            .commit_from_file(path)
            .map_err(|e| anyhow!("Failed to load ONNX model '{}': {}", path.display(), e))?;

        let has_output = session.outputs.iter().any(|o| o.name == output_name);
        if !has_output {
            let available: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
            return Err(anyhow!(
                "ONNX model '{}' has no output named '{}' (available: {})",
                path.display(),
                output_name,
                available.join(", ")
            ));
        }

        tracing::debug!(
            "ONNX session ready: {} (output '{}', {} intra-op threads)",
            path.display(),
            output_name,
            intra_threads.max(1)
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name: output_name.to_string(),
        })
    }
}

impl InferenceSession for OnnxSession {
    fn run(&self, inputs: Vec<InputTensor>) -> Result<Vec<OutputTensor>> {
        let mut ids = None;
        let mut mask = None;
        for input in inputs {
            let tensor = Tensor::from_array((input.shape, input.data))
                .with_context(|| format!("Failed to build tensor '{}'", input.name))?;
            match input.name {
                INPUT_IDS => ids = Some(tensor),
                ATTENTION_MASK => mask = Some(tensor),
                other => return Err(anyhow!("Unexpected input tensor '{}'", other)),
            }
        }
        let ids = ids.ok_or_else(|| anyhow!("Missing input tensor '{}'", INPUT_IDS))?;
        let mask = mask.ok_or_else(|| anyhow!("Missing input tensor '{}'", ATTENTION_MASK))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![INPUT_IDS => ids, ATTENTION_MASK => mask])
            .context("ONNX Runtime forward pass failed")?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .with_context(|| format!("Output '{}' is not an f32 tensor", self.output_name))?;

        let shape = shape
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| anyhow!("Output '{}' has a dynamic dimension", self.output_name))?;

        Ok(vec![OutputTensor {
            name: self.output_name.clone(),
            shape,
            data: data.to_vec(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_of_one_shape() {
        let t = InputTensor::batch_of_one(INPUT_IDS, vec![101, 2023, 102]);
        assert_eq!(t.shape, [1, 3]);
        assert_eq!(t.data.len(), 3);
        assert_eq!(t.name, "input_ids");
    }

    #[test]
    fn test_onnx_session_missing_file() {
        let result = OnnxSession::from_file("/nonexistent/model.onnx", "logits", 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_onnx_session_rejects_garbage_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"definitely not a protobuf").unwrap();
        assert!(OnnxSession::from_file(&path, "logits", 1).is_err());
    }
}
