//! Tokenizer adapter
//!
//! Turns raw text into token ids plus an attention mask. The tokenization
//! algorithm itself is opaque; verdict only relies on the [`TextTokenizer`]
//! contract.

use std::path::Path;

use anyhow::{anyhow, ensure, Result};

/// Token ids and attention mask for a single input string.
///
/// Both sequences always have the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEncoding {
    ids: Vec<i64>,
    attention_mask: Vec<i64>,
}

impl TokenEncoding {
    /// Build an encoding, rejecting sequences of different lengths
    pub fn new(ids: Vec<i64>, attention_mask: Vec<i64>) -> Result<Self> {
        ensure!(
            ids.len() == attention_mask.len(),
            "token ids ({}) and attention mask ({}) differ in length",
            ids.len(),
            attention_mask.len()
        );
        Ok(Self {
            ids,
            attention_mask,
        })
    }

    /// Number of tokens produced for the input
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Split into (ids, attention_mask)
    pub fn into_parts(self) -> (Vec<i64>, Vec<i64>) {
        (self.ids, self.attention_mask)
    }
}

/// Trait for tokenizers used by verdict
///
/// Implementations must be usable from many threads at once.
pub trait TextTokenizer: Send + Sync {
    /// Encode a single string
    fn encode(&self, text: &str) -> Result<TokenEncoding>;

    /// Vocabulary size, including added tokens
    fn vocab_size(&self) -> usize;
}

/// Boxed tokenizer type held by a loaded model resource
pub type BoxedTokenizer = Box<dyn TextTokenizer>;

/// Tokenizer backed by a HuggingFace `tokenizer.json` definition.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a tokenizer definition from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// tokenizer definition.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            anyhow!("Failed to load tokenizer from '{}': {}", path.display(), e)
        })?;
        Ok(Self { inner })
    }

    /// Parse a tokenizer definition from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| anyhow!("Failed to parse tokenizer definition: {}", e))?;
        Ok(Self { inner })
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<TokenEncoding> {
        // Special tokens ([CLS]/[SEP] or equivalents) are what the classifier
        // was trained with, so they are always added.
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let ids = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let mask = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();

        TokenEncoding::new(ids, mask)
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}
