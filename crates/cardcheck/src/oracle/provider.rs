//! Oracle traits and the batch value types they exchange.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OracleConfig;
use crate::error::Result;

use super::json;
use super::ollama::OllamaOracle;
use super::prompts;

/// Record identifier to corrected value, accumulated across chunks.
pub type SuggestionMap = IndexMap<String, String>;

/// A size-bounded slice of correction candidates sent in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionBatch {
    /// Position of this chunk in the full candidate list.
    pub index: usize,
    /// Record identifier to its current (invalid) value.
    pub entries: IndexMap<String, String>,
}

impl CorrectionBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A blocking text-generation service: prompt in, free text out.
///
/// Implementations must be thread-safe (Send + Sync) so that chunks can be
/// dispatched from a bounded worker pool.
pub trait TextOracle: Send + Sync {
    /// Send one prompt and return the raw reply text.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the name of this oracle (for logging/debugging).
    fn name(&self) -> &str;
}

/// Normalizes one chunk of values against a controlled vocabulary.
pub trait ChunkNormalizer: Send + Sync {
    /// Return corrected values for the chunk.
    ///
    /// `Ok(None)` means the oracle answered but nothing usable could be parsed;
    /// `Err` means the oracle could not be reached.
    fn normalize_chunk(
        &self,
        chunk: &CorrectionBatch,
        vocabulary: &[String],
    ) -> Result<Option<SuggestionMap>>;
}

/// Normalizer that prompts a [`TextOracle`] and parses its reply.
pub struct PromptNormalizer<O> {
    oracle: O,
    subject: String,
}

impl<O: TextOracle> PromptNormalizer<O> {
    /// `subject` is the plural noun used in the prompt, e.g. "nationalities".
    pub fn new(oracle: O, subject: impl Into<String>) -> Self {
        Self {
            oracle,
            subject: subject.into(),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl PromptNormalizer<OllamaOracle> {
    /// Ollama-backed normalizer using the configured model and subject noun.
    pub fn ollama(config: OracleConfig) -> Result<Self> {
        let subject = config.subject.clone();
        Ok(Self::new(OllamaOracle::with_config(config)?, subject))
    }
}

impl<O: TextOracle> ChunkNormalizer for PromptNormalizer<O> {
    fn normalize_chunk(
        &self,
        chunk: &CorrectionBatch,
        vocabulary: &[String],
    ) -> Result<Option<SuggestionMap>> {
        let prompt = prompts::normalization_prompt(&self.subject, &chunk.entries, vocabulary);
        debug!(
            oracle = self.oracle.name(),
            chunk = chunk.index,
            prompt_len = prompt.len(),
            "sending chunk to oracle"
        );

        let reply = self.oracle.complete(&prompt)?;
        Ok(json::parse_reply(&reply, &chunk.entries))
    }
}
