//! Streaming retrieval pipeline.
//!
//! The [`RetrievalPipeline`] pulls text units from a lazy source, scores each
//! against an [`ExpandedVocabulary`], drops low-scoring and duplicate units
//! and appends the rest to a [`CorpusSink`] in source order.
//!
//! Every unit ends in exactly one of three states, counted in the
//! [`RunSummary`]:
//!
//! ```text
//! Fetched → Scored → Accepted | RejectedLowScore | RejectedDuplicate
//! ```
//!
//! Two execution models share the same decision logic:
//!
//! - [`run`](RetrievalPipeline::run) processes one unit at a time.
//! - [`run_concurrent`](RetrievalPipeline::run_concurrent) runs a reader
//!   task, a pool of scorer workers and a resequencing decision stage
//!   connected by bounded queues. A permit window caps the number of units
//!   in flight, so memory stays bounded even behind a slow unit.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_core::{PipelineOptions, RetrievalPipeline, InMemoryCorpusSink};
//!
//! let pipeline = RetrievalPipeline::builder()
//!     .vocabulary(Arc::new(vocabulary))
//!     .sink(Arc::new(InMemoryCorpusSink::new()))
//!     .options(PipelineOptions::builder().threshold(0.3).build()?)
//!     .build()?;
//!
//! let summary = pipeline.run(units, &CancellationToken::new()).await?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::PipelineOptions;
use crate::document::{CorpusRecord, ScoredUnit, TextUnit};
use crate::error::{HarvestError, Result, RunError};
use crate::expander::ExpandedVocabulary;
use crate::language::LanguageTag;
use crate::normalize::Fingerprint;
use crate::scorer::RelevanceScorer;
use crate::sink::CorpusSink;
use crate::source::UnitStream;

/// Aggregate counters of one pipeline run.
///
/// `fetched == accepted + rejected_low_score + rejected_duplicate + in_flight`
/// holds after every run, successful or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub fetched: u64,
    pub accepted: u64,
    pub rejected_low_score: u64,
    pub rejected_duplicate: u64,
    /// Units fetched but not yet decided when the run stopped.
    pub in_flight: u64,
}

impl RunSummary {
    /// Units that reached a final state.
    pub fn decided(&self) -> u64 {
        self.accepted + self.rejected_low_score + self.rejected_duplicate
    }

    /// Whether every fetched unit is accounted for.
    pub fn is_reconciled(&self) -> bool {
        self.fetched == self.decided() + self.in_flight
    }
}

/// Fingerprints of every unit accepted during one run.
///
/// Created at run start, grows monotonically, discarded at run end.
#[derive(Debug, Default)]
pub struct SeenSet {
    fingerprints: HashSet<Fingerprint>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Record a fingerprint; returns `false` if it was already present.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.fingerprints.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// The accept/reject stage. Owns the [`SeenSet`] and the decision counters.
struct DecisionStage<'a> {
    sink: &'a dyn CorpusSink,
    language: &'a LanguageTag,
    threshold: f32,
    progress_interval: u64,
    seen: SeenSet,
    summary: RunSummary,
}

impl<'a> DecisionStage<'a> {
    fn new(pipeline: &'a RetrievalPipeline) -> Self {
        Self {
            sink: pipeline.sink.as_ref(),
            language: pipeline.vocabulary.language(),
            threshold: pipeline.options.threshold,
            progress_interval: pipeline.options.progress_interval,
            seen: SeenSet::new(),
            summary: RunSummary::default(),
        }
    }

    /// Decide a scored unit. A sink failure leaves the unit undecided.
    async fn decide(&mut self, scored: ScoredUnit) -> Result<()> {
        if scored.score < self.threshold {
            debug!(locator = %scored.unit.locator, score = scored.score, "rejected: low score");
            self.summary.rejected_low_score += 1;
        } else {
            let fingerprint = Fingerprint::of(&scored.unit.raw_text, self.language);
            if self.seen.contains(&fingerprint) {
                debug!(locator = %scored.unit.locator, "rejected: duplicate");
                self.summary.rejected_duplicate += 1;
            } else {
                let record = CorpusRecord::from_scored(scored);
                self.sink.append(&record).await.map_err(|e| {
                    error!(locator = %record.locator, error = %e, "sink append failed");
                    e
                })?;
                self.seen.insert(fingerprint);
                self.summary.accepted += 1;
            }
        }

        let decided = self.summary.decided();
        if decided % self.progress_interval == 0 {
            info!(
                decided,
                accepted = self.summary.accepted,
                rejected_low_score = self.summary.rejected_low_score,
                rejected_duplicate = self.summary.rejected_duplicate,
                "retrieval progress"
            );
        }
        Ok(())
    }

    fn summary(&self, fetched: u64) -> RunSummary {
        let mut summary = self.summary;
        summary.fetched = fetched;
        summary.in_flight = fetched.saturating_sub(summary.decided());
        summary
    }
}

/// How the reader task of the concurrent pipeline ended.
enum ReaderExit {
    Exhausted,
    Stopped,
    Failed(HarvestError),
}

/// The retrieval pipeline. Construct one via [`RetrievalPipeline::builder()`].
pub struct RetrievalPipeline {
    vocabulary: Arc<ExpandedVocabulary>,
    sink: Arc<dyn CorpusSink>,
    scorer: RelevanceScorer,
    options: PipelineOptions,
}

impl RetrievalPipeline {
    /// Create a new [`RetrievalPipelineBuilder`].
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    pub fn vocabulary(&self) -> &Arc<ExpandedVocabulary> {
        &self.vocabulary
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Score, deduplicate and persist every unit of `source`, one at a time.
    ///
    /// Cancellation is checked between units, including while waiting on
    /// the source.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] carrying the partial [`RunSummary`] if the
    /// source fails, the sink fails or `cancel` fires.
    pub async fn run(
        &self,
        mut source: UnitStream,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunSummary, RunError> {
        let mut stage = DecisionStage::new(self);
        let mut fetched = 0u64;
        info!(terms = self.vocabulary.len(), threshold = self.options.threshold, "retrieval run started");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.abort(stage.summary(fetched), HarvestError::Cancelled));
                }
                next = source.next() => next,
            };
            let unit = match next {
                None => break,
                Some(Ok(unit)) => unit,
                Some(Err(e)) => return Err(self.abort(stage.summary(fetched), e)),
            };
            fetched += 1;
            let scored = self.scorer.score(unit, &self.vocabulary);
            if let Err(e) = stage.decide(scored).await {
                return Err(self.abort(stage.summary(fetched), e));
            }
        }

        self.finish(stage.summary(fetched)).await
    }

    /// Like [`run`](Self::run), with reading, scoring and persisting
    /// overlapped across tasks.
    ///
    /// Scored units are resequenced before the decision stage, so records
    /// reach the sink in source order and the first occurrence of duplicate
    /// content is the one kept.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run); [`HarvestError::PipelineError`] if a stage
    /// task panics.
    pub async fn run_concurrent(
        &self,
        mut source: UnitStream,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunSummary, RunError> {
        let capacity = self.options.queue_capacity;
        let workers = self.options.workers;
        let stop = cancel.child_token();
        let fetched = Arc::new(AtomicU64::new(0));
        let window = Arc::new(Semaphore::new(capacity * 2 + workers));

        let (work_tx, work_rx) = mpsc::channel::<(u64, TextUnit, OwnedSemaphorePermit)>(capacity);
        let (done_tx, mut done_rx) =
            mpsc::channel::<(u64, ScoredUnit, OwnedSemaphorePermit)>(capacity);
        info!(
            terms = self.vocabulary.len(),
            threshold = self.options.threshold,
            workers,
            capacity,
            "concurrent retrieval run started"
        );

        let reader = {
            let stop = stop.clone();
            let fetched = Arc::clone(&fetched);
            tokio::spawn(async move {
                let mut seq = 0u64;
                loop {
                    let permit = tokio::select! {
                        biased;
                        _ = stop.cancelled() => return ReaderExit::Stopped,
                        permit = Arc::clone(&window).acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return ReaderExit::Stopped,
                        },
                    };
                    let next = tokio::select! {
                        biased;
                        _ = stop.cancelled() => return ReaderExit::Stopped,
                        next = source.next() => next,
                    };
                    let unit = match next {
                        None => return ReaderExit::Exhausted,
                        Some(Ok(unit)) => unit,
                        Some(Err(e)) => return ReaderExit::Failed(e),
                    };
                    fetched.fetch_add(1, Ordering::AcqRel);
                    let sent = tokio::select! {
                        biased;
                        _ = stop.cancelled() => return ReaderExit::Stopped,
                        sent = work_tx.send((seq, unit, permit)) => sent,
                    };
                    if sent.is_err() {
                        return ReaderExit::Stopped;
                    }
                    seq += 1;
                }
            })
        };

        let work_rx = Arc::new(Mutex::new(work_rx));
        let mut scorers = JoinSet::new();
        for _ in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let done_tx = done_tx.clone();
            let vocabulary = Arc::clone(&self.vocabulary);
            let scorer = self.scorer;
            scorers.spawn(async move {
                loop {
                    let next = work_rx.lock().await.recv().await;
                    let Some((seq, unit, permit)) = next else {
                        break;
                    };
                    let scored = scorer.score(unit, &vocabulary);
                    if done_tx.send((seq, scored, permit)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        let mut stage = DecisionStage::new(self);
        let mut pending: BTreeMap<u64, (ScoredUnit, OwnedSemaphorePermit)> = BTreeMap::new();
        let mut next_seq = 0u64;
        let mut failure: Option<HarvestError> = None;

        'receive: loop {
            let received = tokio::select! {
                biased;
                _ = stop.cancelled() => break 'receive,
                received = done_rx.recv() => received,
            };
            let Some((seq, scored, permit)) = received else {
                break;
            };
            pending.insert(seq, (scored, permit));
            while let Some((scored, permit)) = pending.remove(&next_seq) {
                next_seq += 1;
                let decided = stage.decide(scored).await;
                drop(permit);
                if let Err(e) = decided {
                    failure = Some(e);
                    stop.cancel();
                    break 'receive;
                }
            }
        }

        drop(done_rx);
        drop(pending);
        stop.cancel();
        let reader_exit = reader.await;
        while let Some(joined) = scorers.join_next().await {
            if let Err(e) = joined {
                failure.get_or_insert(HarvestError::PipelineError(format!("scorer task failed: {e}")));
            }
        }
        let summary = stage.summary(fetched.load(Ordering::Acquire));

        if let Some(e) = failure {
            return Err(self.abort(summary, e));
        }
        match reader_exit {
            Err(e) => {
                return Err(self.abort(
                    summary,
                    HarvestError::PipelineError(format!("reader task failed: {e}")),
                ));
            }
            Ok(ReaderExit::Failed(e)) => return Err(self.abort(summary, e)),
            Ok(ReaderExit::Stopped) | Ok(ReaderExit::Exhausted) if cancel.is_cancelled() => {
                return Err(self.abort(summary, HarvestError::Cancelled));
            }
            Ok(ReaderExit::Stopped) | Ok(ReaderExit::Exhausted) => {}
        }

        self.finish(summary).await
    }

    async fn finish(&self, summary: RunSummary) -> std::result::Result<RunSummary, RunError> {
        if let Err(e) = self.sink.flush().await {
            return Err(self.abort(summary, e));
        }
        info!(
            fetched = summary.fetched,
            accepted = summary.accepted,
            rejected_low_score = summary.rejected_low_score,
            rejected_duplicate = summary.rejected_duplicate,
            "retrieval run complete"
        );
        Ok(summary)
    }

    fn abort(&self, summary: RunSummary, e: HarvestError) -> RunError {
        error!(
            fetched = summary.fetched,
            accepted = summary.accepted,
            in_flight = summary.in_flight,
            error = %e,
            "retrieval run aborted"
        );
        RunError::new(summary, e)
    }
}

/// Builder for constructing a [`RetrievalPipeline`].
///
/// `vocabulary`, `sink` and `options` are required; the scorer defaults to
/// [`RelevanceScorer::default()`].
#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    vocabulary: Option<Arc<ExpandedVocabulary>>,
    sink: Option<Arc<dyn CorpusSink>>,
    scorer: Option<RelevanceScorer>,
    options: Option<PipelineOptions>,
}

impl RetrievalPipelineBuilder {
    pub fn vocabulary(mut self, vocabulary: Arc<ExpandedVocabulary>) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn CorpusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Build the [`RetrievalPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if a required field is missing
    /// or the options are invalid.
    pub fn build(self) -> Result<RetrievalPipeline> {
        let vocabulary = self
            .vocabulary
            .ok_or_else(|| HarvestError::ConfigError("vocabulary is required".to_string()))?;
        let sink =
            self.sink.ok_or_else(|| HarvestError::ConfigError("sink is required".to_string()))?;
        let options = self
            .options
            .ok_or_else(|| HarvestError::ConfigError("options are required".to_string()))?;
        options.validate()?;

        Ok(RetrievalPipeline {
            vocabulary,
            sink,
            scorer: self.scorer.unwrap_or_default(),
            options,
        })
    }
}
