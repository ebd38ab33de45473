//! Chunked normalization of correction candidates through an oracle.
//!
//! Candidates are split into fixed-size chunks in iteration order. Chunks are
//! dispatched sequentially, or on a pool of `max_in_flight` workers;
//! results are always folded in chunk order, so the outcome does not depend
//! on the degree of parallelism. A failing chunk is logged and skipped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BatchConfig, CapPolicy};
use crate::error::{CardcheckError, Result};

use super::provider::{ChunkNormalizer, CorrectionBatch, SuggestionMap};

/// Split candidates into chunks of at most `chunk_size`, preserving order.
pub fn split_into_batches(
    candidates: &IndexMap<String, String>,
    chunk_size: usize,
) -> Vec<CorrectionBatch> {
    let chunk_size = chunk_size.max(1);
    let entries: Vec<(&String, &String)> = candidates.iter().collect();

    entries
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, chunk)| CorrectionBatch {
            index,
            entries: chunk
                .iter()
                .map(|(k, v)| ((*k).clone(), (*v).clone()))
                .collect(),
        })
        .collect()
}

/// Shared flag for stopping a run between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next chunk.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a chunk produced no suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// Chunk index.
    pub index: usize,
    /// Number of candidates in the chunk.
    pub keys: usize,
    pub reason: String,
}

/// Outcome of a normalization run.
///
/// `suggestions` only contains identifiers the oracle resolved; everything
/// else is absent, not present with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRun {
    pub suggestions: SuggestionMap,
    /// Chunks the candidates were split into.
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    /// Chunks left for a later [`CorrectionPipeline::resume`].
    pub deferred: Vec<CorrectionBatch>,
    /// Chunks discarded under [`CapPolicy::Drop`].
    pub dropped_chunks: usize,
    /// Whether the run stopped early on the cancel token.
    pub cancelled: bool,
}

impl NormalizationRun {
    /// True when every chunk has been attempted.
    pub fn is_complete(&self) -> bool {
        self.deferred.is_empty() && self.dropped_chunks == 0 && !self.cancelled
    }

    /// Suggestions, or `None` when nothing was resolved.
    pub fn into_suggestions(self) -> Option<SuggestionMap> {
        if self.chunks_succeeded == 0 {
            None
        } else {
            Some(self.suggestions)
        }
    }
}

/// Drives chunked normalization through a [`ChunkNormalizer`].
#[derive(Debug, Clone, Default)]
pub struct CorrectionPipeline {
    config: BatchConfig,
}

impl CorrectionPipeline {
    /// Create a pipeline, rejecting configurations that cannot make progress.
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Normalize all candidates and return the accumulated suggestions.
    ///
    /// Empty input returns `None` without calling the oracle, as does a run
    /// in which no chunk succeeded.
    pub fn normalize(
        &self,
        normalizer: &dyn ChunkNormalizer,
        candidates: &IndexMap<String, String>,
        vocabulary: &[String],
    ) -> Option<SuggestionMap> {
        self.run(normalizer, candidates, vocabulary, &CancelToken::new())
            .into_suggestions()
    }

    /// Normalize candidates, reporting per-chunk outcomes.
    pub fn run(
        &self,
        normalizer: &dyn ChunkNormalizer,
        candidates: &IndexMap<String, String>,
        vocabulary: &[String],
        cancel: &CancelToken,
    ) -> NormalizationRun {
        if candidates.is_empty() {
            debug!("no correction candidates; skipping oracle");
            return NormalizationRun::default();
        }

        let batches = split_into_batches(candidates, self.config.chunk_size);
        let mut run = NormalizationRun {
            chunks_total: batches.len(),
            ..NormalizationRun::default()
        };
        info!(
            candidates = candidates.len(),
            chunks = batches.len(),
            chunk_size = self.config.chunk_size,
            "starting normalization run"
        );

        self.process(normalizer, batches, vocabulary, cancel, &mut run);
        run
    }

    /// Process chunks deferred by an earlier run, growing its suggestions.
    pub fn resume(
        &self,
        normalizer: &dyn ChunkNormalizer,
        mut run: NormalizationRun,
        vocabulary: &[String],
        cancel: &CancelToken,
    ) -> NormalizationRun {
        let pending = std::mem::take(&mut run.deferred);
        run.cancelled = false;
        info!(chunks = pending.len(), "resuming normalization run");

        self.process(normalizer, pending, vocabulary, cancel, &mut run);
        run
    }

    /// Run chunks on a pool of `max_in_flight` workers. Results come back in
    /// chunk order, so folding them matches the sequential outcome.
    fn dispatch_parallel(
        &self,
        normalizer: &dyn ChunkNormalizer,
        batches: Vec<CorrectionBatch>,
        vocabulary: &[String],
        cancel: &CancelToken,
        run: &mut NormalizationRun,
    ) -> Vec<CorrectionBatch> {
        let pool = match ThreadPoolBuilder::new()
            .num_threads(self.config.max_in_flight)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "could not start oracle worker pool; running sequentially");
                return dispatch_sequential(normalizer, batches, vocabulary, cancel, run);
            }
        };

        debug!(
            workers = self.config.max_in_flight,
            chunks = batches.len(),
            "dispatching chunks to worker pool"
        );
        let results: Vec<Option<Result<Option<SuggestionMap>>>> = pool.install(|| {
            batches
                .par_iter()
                .map(|batch| normalize_on_worker(normalizer, batch, vocabulary, cancel))
                .collect()
        });

        let mut unprocessed = Vec::new();
        for (batch, result) in batches.into_iter().zip(results) {
            match result {
                Some(result) => fold(run, &batch, result),
                None => {
                    run.cancelled = true;
                    unprocessed.push(batch);
                }
            }
        }
        unprocessed
    }

    fn process(
        &self,
        normalizer: &dyn ChunkNormalizer,
        mut batches: Vec<CorrectionBatch>,
        vocabulary: &[String],
        cancel: &CancelToken,
        run: &mut NormalizationRun,
    ) {
        let cap = self.config.max_chunks.unwrap_or(usize::MAX);
        let over_cap = if batches.len() > cap {
            batches.split_off(cap)
        } else {
            Vec::new()
        };
        if !over_cap.is_empty() {
            info!(
                processed = batches.len(),
                beyond_cap = over_cap.len(),
                "chunk cap reached"
            );
        }

        let mut unprocessed = if self.config.max_in_flight > 1 {
            self.dispatch_parallel(normalizer, batches, vocabulary, cancel, run)
        } else {
            dispatch_sequential(normalizer, batches, vocabulary, cancel, run)
        };
        if run.cancelled {
            warn!(remaining = unprocessed.len(), "normalization run cancelled");
        }

        unprocessed.extend(over_cap);
        if unprocessed.is_empty() {
            return;
        }

        match self.config.cap_policy {
            CapPolicy::Defer => {
                debug!(chunks = unprocessed.len(), "deferring unprocessed chunks");
                run.deferred.extend(unprocessed);
            }
            CapPolicy::Drop => {
                warn!(chunks = unprocessed.len(), "dropping unprocessed chunks");
                run.dropped_chunks += unprocessed.len();
            }
        }
    }
}

/// Run chunks one at a time, returning those left when the token fires.
fn dispatch_sequential(
    normalizer: &dyn ChunkNormalizer,
    batches: Vec<CorrectionBatch>,
    vocabulary: &[String],
    cancel: &CancelToken,
    run: &mut NormalizationRun,
) -> Vec<CorrectionBatch> {
    let mut queue = batches.into_iter();
    while let Some(batch) = queue.next() {
        if cancel.is_cancelled() {
            run.cancelled = true;
            return std::iter::once(batch).chain(queue).collect();
        }
        let result = normalizer.normalize_chunk(&batch, vocabulary);
        fold(run, &batch, result);
    }
    Vec::new()
}

/// Normalize one chunk on a pool worker. `None` means the run was cancelled
/// before the chunk started.
fn normalize_on_worker(
    normalizer: &dyn ChunkNormalizer,
    batch: &CorrectionBatch,
    vocabulary: &[String],
    cancel: &CancelToken,
) -> Option<Result<Option<SuggestionMap>>> {
    if cancel.is_cancelled() {
        return None;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        normalizer.normalize_chunk(batch, vocabulary)
    }))
    .unwrap_or_else(|_| Err(CardcheckError::Oracle("oracle worker panicked".to_string())));
    Some(result)
}

fn fold(
    run: &mut NormalizationRun,
    batch: &CorrectionBatch,
    result: Result<Option<SuggestionMap>>,
) {
    match result {
        Ok(Some(map)) => {
            debug!(
                chunk = batch.index,
                requested = batch.len(),
                resolved = map.len(),
                "chunk normalized"
            );
            run.chunks_succeeded += 1;
            run.suggestions.extend(map);
        }
        Ok(None) => {
            warn!(chunk = batch.index, "oracle reply could not be parsed; skipping chunk");
            run.failed_chunks.push(ChunkFailure {
                index: batch.index,
                keys: batch.len(),
                reason: "unparseable reply".to_string(),
            });
        }
        Err(e) => {
            warn!(chunk = batch.index, error = %e, "oracle call failed; skipping chunk");
            run.failed_chunks.push(ChunkFailure {
                index: batch.index,
                keys: batch.len(),
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    fn candidates(n: usize) -> IndexMap<String, String> {
        (0..n).map(|i| (format!("td{i}"), format!("value{i}"))).collect()
    }

    /// Uppercases every value; fails on the listed chunk indices.
    struct Upper {
        unparseable: Vec<usize>,
        calls: Mutex<Vec<usize>>,
    }

    impl Upper {
        fn new(unparseable: Vec<usize>) -> Self {
            Self {
                unparseable,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<usize> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }
    }

    impl ChunkNormalizer for Upper {
        fn normalize_chunk(
            &self,
            chunk: &CorrectionBatch,
            _vocabulary: &[String],
        ) -> Result<Option<SuggestionMap>> {
            self.calls.lock().unwrap().push(chunk.index);
            if self.unparseable.contains(&chunk.index) {
                return Ok(None);
            }
            Ok(Some(
                chunk
                    .entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_uppercase()))
                    .collect(),
            ))
        }
    }

    #[test]
    fn test_split_sizes() {
        let batches = split_into_batches(&candidates(45), 20);
        let sizes: Vec<usize> = batches.iter().map(CorrectionBatch::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(batches[2].index, 2);
        assert_eq!(batches[1].entries.keys().next().unwrap(), "td20");
    }

    #[test]
    fn test_empty_input_skips_oracle() {
        let pipeline = CorrectionPipeline::default();
        let normalizer = Upper::new(vec![]);
        assert!(pipeline.normalize(&normalizer, &IndexMap::new(), &[]).is_none());
        assert!(normalizer.calls().is_empty());
    }

    #[test]
    fn test_failed_chunk_keys_are_absent() {
        let pipeline = CorrectionPipeline::new(BatchConfig::uncapped()).unwrap();
        let normalizer = Upper::new(vec![1]);

        let run = pipeline.run(&normalizer, &candidates(45), &[], &CancelToken::new());

        assert_eq!(run.chunks_total, 3);
        assert_eq!(run.chunks_succeeded, 2);
        assert_eq!(run.failed_chunks.len(), 1);
        assert_eq!(run.failed_chunks[0].index, 1);
        assert_eq!(run.suggestions.len(), 25);
        assert!(!run.suggestions.contains_key("td20"));
        assert!(!run.suggestions.contains_key("td39"));
        assert_eq!(run.suggestions["td40"], "VALUE40");
        assert!(run.is_complete());
    }

    #[test]
    fn test_cap_defers_and_resume_completes() {
        let config = BatchConfig::default()
            .with_chunk_size(10)
            .with_max_chunks(Some(2));
        let pipeline = CorrectionPipeline::new(config).unwrap();
        let normalizer = Upper::new(vec![]);

        let run = pipeline.run(&normalizer, &candidates(45), &[], &CancelToken::new());
        assert_eq!(run.chunks_succeeded, 2);
        assert_eq!(run.suggestions.len(), 20);
        assert_eq!(run.deferred.len(), 3);
        assert!(!run.is_complete());

        let run = pipeline.resume(&normalizer, run, &[], &CancelToken::new());
        assert_eq!(run.deferred.len(), 1);
        let run = pipeline.resume(&normalizer, run, &[], &CancelToken::new());
        assert!(run.is_complete());
        assert_eq!(run.suggestions.len(), 45);
        assert_eq!(run.chunks_succeeded, 5);
        assert_eq!(normalizer.calls(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cap_drop_policy() {
        let config = BatchConfig::default()
            .with_chunk_size(20)
            .with_max_chunks(Some(1))
            .with_cap_policy(CapPolicy::Drop);
        let pipeline = CorrectionPipeline::new(config).unwrap();

        let run = pipeline.run(&Upper::new(vec![]), &candidates(45), &[], &CancelToken::new());
        assert_eq!(run.dropped_chunks, 2);
        assert!(run.deferred.is_empty());
        assert_eq!(run.suggestions.len(), 20);
    }

    #[test]
    fn test_cancelled_before_start() {
        let pipeline = CorrectionPipeline::new(BatchConfig::uncapped()).unwrap();
        let normalizer = Upper::new(vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let run = pipeline.run(&normalizer, &candidates(45), &[], &cancel);
        assert!(run.cancelled);
        assert_eq!(run.deferred.len(), 3);
        assert!(run.suggestions.is_empty());
        assert!(normalizer.calls().is_empty());
        assert!(run.clone().into_suggestions().is_none());
    }

    /// Cancels the shared token from inside the first call.
    struct CancelAfterFirst {
        token: CancelToken,
    }

    impl ChunkNormalizer for CancelAfterFirst {
        fn normalize_chunk(
            &self,
            chunk: &CorrectionBatch,
            _vocabulary: &[String],
        ) -> Result<Option<SuggestionMap>> {
            self.token.cancel();
            Ok(Some(chunk.entries.clone()))
        }
    }

    #[test]
    fn test_cancel_keeps_partial_results() {
        let pipeline = CorrectionPipeline::new(BatchConfig::uncapped()).unwrap();
        let token = CancelToken::new();
        let normalizer = CancelAfterFirst {
            token: token.clone(),
        };

        let run = pipeline.run(&normalizer, &candidates(45), &[], &token);
        assert!(run.cancelled);
        assert_eq!(run.chunks_succeeded, 1);
        assert_eq!(run.suggestions.len(), 20);
        assert_eq!(run.deferred.len(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential =
            CorrectionPipeline::new(BatchConfig::uncapped().with_chunk_size(7)).unwrap();
        let parallel = CorrectionPipeline::new(
            BatchConfig::uncapped()
                .with_chunk_size(7)
                .with_max_in_flight(3),
        )
        .unwrap();

        let input = candidates(45);
        let a = sequential.run(&Upper::new(vec![2]), &input, &[], &CancelToken::new());
        let b = parallel.run(&Upper::new(vec![2]), &input, &[], &CancelToken::new());

        assert_eq!(a, b);
        assert_eq!(
            b.suggestions.keys().collect::<Vec<_>>(),
            a.suggestions.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_parallel_cancelled_before_start_defers_everything() {
        let pipeline =
            CorrectionPipeline::new(BatchConfig::uncapped().with_max_in_flight(4)).unwrap();
        let normalizer = Upper::new(vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let run = pipeline.run(&normalizer, &candidates(45), &[], &cancel);
        assert!(run.cancelled);
        assert_eq!(run.deferred.len(), 3);
        assert_eq!(
            run.deferred.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(normalizer.calls().is_empty());
    }

    /// Chunk 0 stalls until chunk 3 has started, or gives up after a timeout.
    struct StallFirst {
        started: Mutex<Vec<usize>>,
        signal: Condvar,
    }

    impl ChunkNormalizer for StallFirst {
        fn normalize_chunk(
            &self,
            chunk: &CorrectionBatch,
            _vocabulary: &[String],
        ) -> Result<Option<SuggestionMap>> {
            let mut started = self.started.lock().unwrap();
            started.push(chunk.index);
            self.signal.notify_all();

            if chunk.index == 0 {
                let (started, _) = self
                    .signal
                    .wait_timeout_while(started, Duration::from_secs(5), |s| !s.contains(&3))
                    .unwrap();
                if !started.contains(&3) {
                    return Ok(None);
                }
            }
            Ok(Some(chunk.entries.clone()))
        }
    }

    #[test]
    fn test_slow_chunk_does_not_hold_back_later_chunks() {
        let pipeline = CorrectionPipeline::new(
            BatchConfig::uncapped()
                .with_chunk_size(5)
                .with_max_in_flight(3),
        )
        .unwrap();
        let normalizer = StallFirst {
            started: Mutex::new(Vec::new()),
            signal: Condvar::new(),
        };

        let run = pipeline.run(&normalizer, &candidates(30), &[], &CancelToken::new());
        assert!(run.failed_chunks.is_empty());
        assert_eq!(run.chunks_succeeded, 6);
        assert_eq!(run.suggestions.keys().next().map(String::as_str), Some("td0"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(CorrectionPipeline::new(BatchConfig::default().with_chunk_size(0)).is_err());
    }
}
