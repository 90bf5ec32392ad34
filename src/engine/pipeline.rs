//! Prediction pipeline
//!
//! Stateless transformation from (text, model resource) to class
//! probabilities: validate, tokenize, shape as a batch of one, run the
//! session, decode the logits with a two-class softmax.

use serde::{Deserialize, Serialize};

use crate::config::{InferenceConfig, LabelConfig};
use crate::engine::resource::ModelResource;
use crate::engine::session::{InputTensor, OutputTensor, ATTENTION_MASK, INPUT_IDS};
use crate::engine::{InferenceError, PredictError, ValidationError};

/// Default maximum input length in characters
pub const DEFAULT_MAX_TEXT_CHARS: usize = 4096;

/// Probability pair for the two classes. The fields always sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "positive")]
    pub positive_probability: f64,
    #[serde(rename = "negative")]
    pub negative_probability: f64,
}

impl PredictionResult {
    /// Build a result from the two class logits
    pub fn from_logits(negative: f32, positive: f32) -> Self {
        let positive_probability = softmax2(negative, positive);
        Self {
            positive_probability,
            negative_probability: 1.0 - positive_probability,
        }
    }
}

/// Probability of the second class under a two-class softmax.
///
/// The larger logit is subtracted before exponentiating so that large
/// logits cannot overflow.
pub fn softmax2(logit0: f32, logit1: f32) -> f64 {
    let (a0, a1) = (f64::from(logit0), f64::from(logit1));
    let m = a0.max(a1);
    let e0 = (a0 - m).exp();
    let e1 = (a1 - m).exp();
    e1 / (e0 + e1)
}

/// Prediction pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    max_text_chars: usize,
    labels: LabelConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            labels: LabelConfig::default(),
        }
    }
}

impl Pipeline {
    pub fn new(max_text_chars: usize, labels: LabelConfig) -> Self {
        Self {
            max_text_chars,
            labels,
        }
    }

    /// Create a pipeline from configuration
    pub fn from_config(inference: &InferenceConfig, labels: &LabelConfig) -> Self {
        Self::new(inference.max_text_chars, labels.clone())
    }

    /// Reject blank or over-long input
    pub fn validate(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::Blank);
        }
        let chars = text.chars().count();
        if chars > self.max_text_chars {
            return Err(ValidationError::TooLong {
                chars,
                max: self.max_text_chars,
            });
        }
        Ok(())
    }

    /// Classify `text` with the given resource
    pub fn predict(
        &self,
        resource: &ModelResource,
        text: &str,
    ) -> Result<PredictionResult, PredictError> {
        self.validate(text)?;

        let encoding = resource
            .tokenizer()
            .encode(text)
            .map_err(InferenceError::Tokenizer)?;
        let num_tokens = encoding.len();
        if encoding.is_empty() {
            return Err(InferenceError::MalformedOutput(
                "tokenizer produced no tokens".to_string(),
            )
            .into());
        }

        // The engine expects a batch axis even for a single request
        let (ids, mask) = encoding.into_parts();
        let inputs = vec![
            InputTensor::batch_of_one(INPUT_IDS, ids),
            InputTensor::batch_of_one(ATTENTION_MASK, mask),
        ];

        let outputs = resource
            .session()
            .run(inputs)
            .map_err(InferenceError::Engine)?;

        let (negative, positive) = self.decode_logits(&outputs)?;
        let result = PredictionResult::from_logits(negative, positive);

        tracing::debug!(
            "Predicted {} chars / {} tokens with generation {}: positive={:.4} negative={:.4}",
            text.chars().count(),
            num_tokens,
            resource.generation(),
            result.positive_probability,
            result.negative_probability
        );

        Ok(result)
    }

    /// Pick (negative, positive) logits out of a `[1, 2]` output
    fn decode_logits(&self, outputs: &[OutputTensor]) -> Result<(f32, f32), InferenceError> {
        let logits = outputs
            .first()
            .ok_or_else(|| InferenceError::MalformedOutput("engine returned no outputs".into()))?;

        if logits.shape.as_slice() != [1, 2] || logits.data.len() != 2 {
            return Err(InferenceError::MalformedOutput(format!(
                "expected logits of shape [1, 2], got {:?} with {} values",
                logits.shape,
                logits.data.len()
            )));
        }

        let pick = |index: usize| {
            logits.data.get(index).copied().ok_or_else(|| {
                InferenceError::MalformedOutput(format!("no logit at class index {}", index))
            })
        };
        let negative = pick(self.labels.negative_index)?;
        let positive = pick(self.labels.positive_index)?;

        if !negative.is_finite() || !positive.is_finite() {
            return Err(InferenceError::MalformedOutput(format!(
                "non-finite logits [{}, {}]",
                negative, positive
            )));
        }
        Ok((negative, positive))
    }
}
