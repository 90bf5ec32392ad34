//! Loaded model resource
//!
//! A [`ModelResource`] pairs an inference session with the tokenizer it was
//! trained with. The two are built, published and retired together.

use chrono::{DateTime, Utc};

use crate::engine::session::{BoxedSession, InferenceSession};
use crate::tokenizer::{BoxedTokenizer, TextTokenizer};

/// Session and tokenizer produced by a [`crate::loader::ResourceLoader`]
pub struct ResourceParts {
    pub session: BoxedSession,
    pub tokenizer: BoxedTokenizer,
}

impl ResourceParts {
    pub fn new<S, T>(session: S, tokenizer: T) -> Self
    where
        S: InferenceSession + 'static,
        T: TextTokenizer + 'static,
    {
        Self {
            session: Box::new(session),
            tokenizer: Box::new(tokenizer),
        }
    }
}

/// Immutable bundle of a loaded session and tokenizer.
///
/// Only the lifecycle manager creates or retires these; everything else
/// borrows one for the duration of a single prediction.
pub struct ModelResource {
    session: BoxedSession,
    tokenizer: BoxedTokenizer,
    /// Monotonic id assigned at install time
    generation: u64,
    loaded_at: DateTime<Utc>,
}

impl ModelResource {
    pub(crate) fn new(parts: ResourceParts, generation: u64) -> Self {
        Self {
            session: parts.session,
            tokenizer: parts.tokenizer,
            generation,
            loaded_at: Utc::now(),
        }
    }

    pub fn session(&self) -> &dyn InferenceSession {
        self.session.as_ref()
    }

    pub fn tokenizer(&self) -> &dyn TextTokenizer {
        self.tokenizer.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Release the session and tokenizer.
    ///
    /// Called by the lifecycle manager once no prediction holds the resource.
    pub(crate) fn release(self) {
        let generation = self.generation;
        drop(self.session);
        drop(self.tokenizer);
        tracing::info!("Released model generation {}", generation);
    }
}

impl std::fmt::Debug for ModelResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResource")
            .field("generation", &self.generation)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}
