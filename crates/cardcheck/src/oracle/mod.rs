//! Oracle integration for correction suggestions.
//!
//! Invalid categorical values are sent, a chunk at a time, to a text-generation
//! service that maps each one onto a controlled vocabulary. Replies are free
//! text and are parsed on a best-effort basis; suggestions are advisory only.
//!
//! # Example
//!
//! ```no_run
//! use cardcheck::oracle::{CancelToken, CorrectionPipeline, PromptNormalizer};
//! use cardcheck::{BatchConfig, OracleConfig};
//! use indexmap::IndexMap;
//!
//! let normalizer = PromptNormalizer::ollama(OracleConfig::default()).unwrap();
//! let pipeline = CorrectionPipeline::new(BatchConfig::default()).unwrap();
//!
//! let mut candidates = IndexMap::new();
//! candidates.insert("1201".to_string(), "ungarisch".to_string());
//!
//! let vocabulary = vec!["hungarian".to_string(), "german".to_string()];
//! let run = pipeline.run(&normalizer, &candidates, &vocabulary, &CancelToken::new());
//! println!("resolved {} of {}", run.suggestions.len(), candidates.len());
//! ```

mod batching;
mod json;
mod mock;
mod ollama;
mod prompts;
mod provider;

pub use batching::{
    CancelToken, ChunkFailure, CorrectionPipeline, NormalizationRun, split_into_batches,
};
pub use json::{first_balanced_object, parse_reply};
pub use mock::MockOracle;
pub use ollama::OllamaOracle;
pub use prompts::normalization_prompt;
pub use provider::{ChunkNormalizer, CorrectionBatch, PromptNormalizer, SuggestionMap, TextOracle};
