//! Mock adapters for exercising the serving core without real model files

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Result};

use crate::engine::session::{InferenceSession, InputTensor, OutputTensor, INPUT_IDS};
use crate::engine::{LoadError, ResourceParts};
use crate::loader::ResourceLoader;
use crate::tokenizer::{TextTokenizer, TokenEncoding};

/// Shared counters observed by tests
#[derive(Default)]
pub struct Counters {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub tokenize_calls: AtomicUsize,
    pub engine_calls: AtomicUsize,
    /// Incremented for every successful load; stamped into both parts
    pub builds: AtomicU64,
    /// Build stamp of the most recent engine call
    pub last_engine_build: AtomicU64,
}

impl Counters {
    /// Resources acquired but not yet released
    pub fn outstanding(&self) -> usize {
        self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

/// Tokenizer that emits the build stamp as its first id, then one id per word
pub struct MockTokenizer {
    build: u64,
    counters: Arc<Counters>,
}

impl TextTokenizer for MockTokenizer {
    fn encode(&self, text: &str) -> Result<TokenEncoding> {
        self.counters.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        let mut ids = vec![self.build as i64];
        ids.extend(text.split_whitespace().map(|w| w.len() as i64));
        let mask = vec![1; ids.len()];
        TokenEncoding::new(ids, mask)
    }

    fn vocab_size(&self) -> usize {
        30522
    }
}

impl Drop for MockTokenizer {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session returning fixed logits.
///
/// Fails if the token stream was produced by a tokenizer from another build,
/// which would mean a prediction saw a torn resource.
pub struct MockSession {
    build: u64,
    logits: Vec<f32>,
    shape: Vec<usize>,
    delay: Duration,
    counters: Arc<Counters>,
}

impl InferenceSession for MockSession {
    fn run(&self, inputs: Vec<InputTensor>) -> Result<Vec<OutputTensor>> {
        self.counters.engine_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let ids = inputs
            .iter()
            .find(|t| t.name == INPUT_IDS)
            .ok_or_else(|| anyhow!("missing input_ids"))?;
        ensure!(ids.shape[0] == 1, "expected batch of one");
        ensure!(
            ids.data.first().copied() == Some(self.build as i64),
            "tokenizer build {:?} does not match session build {}",
            ids.data.first(),
            self.build
        );
        self.counters
            .last_engine_build
            .store(self.build, Ordering::SeqCst);

        Ok(vec![OutputTensor {
            name: "logits".to_string(),
            shape: self.shape.clone(),
            data: self.logits.clone(),
        }])
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Loader producing mock parts, with switches to simulate failures
pub struct MockLoader {
    pub counters: Arc<Counters>,
    logits: Vec<f32>,
    shape: Vec<usize>,
    delay: Duration,
    build_delay: Duration,
    missing: AtomicBool,
    malformed: AtomicBool,
}

impl MockLoader {
    pub fn new(logits: [f32; 2]) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            logits: logits.to_vec(),
            shape: vec![1, 2],
            delay: Duration::ZERO,
            build_delay: Duration::ZERO,
            missing: AtomicBool::new(false),
            malformed: AtomicBool::new(false),
        }
    }

    /// Override the raw output tensor
    pub fn with_output(mut self, shape: Vec<usize>, data: Vec<f32>) -> Self {
        self.shape = shape;
        self.logits = data;
        self
    }

    /// Make every engine call sleep
    pub fn with_engine_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every load sleep before returning
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn set_missing(&self, missing: bool) {
        self.missing.store(missing, Ordering::SeqCst);
    }

    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }
}

impl ResourceLoader for MockLoader {
    fn load(&self) -> Result<ResourceParts, LoadError> {
        if !self.build_delay.is_zero() {
            std::thread::sleep(self.build_delay);
        }
        if self.missing.load(Ordering::SeqCst) {
            return Err(LoadError::ResourcesMissing {
                missing: vec!["weights/model.onnx".into()],
            });
        }
        if self.malformed.load(Ordering::SeqCst) {
            return Err(LoadError::ConstructionFailed(anyhow!(
                "mock model is malformed"
            )));
        }

        let build = self.counters.builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.acquired.fetch_add(2, Ordering::SeqCst);

        Ok(ResourceParts::new(
            MockSession {
                build,
                logits: self.logits.clone(),
                shape: self.shape.clone(),
                delay: self.delay,
                counters: Arc::clone(&self.counters),
            },
            MockTokenizer {
                build,
                counters: Arc::clone(&self.counters),
            },
        ))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
