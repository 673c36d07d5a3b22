//! One harvest run: seed preparation, keyword expansion and retrieval.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ExpansionConfig, PipelineOptions};
use crate::error::{HarvestError, Result, RunError};
use crate::expander::{ExpandedVocabulary, KeywordExpander, SeedKeyword};
use crate::keywords::{Stopwords, extract_keywords};
use crate::language::LanguageTag;
use crate::oracle::OracleRegistry;
use crate::pipeline::{RetrievalPipeline, RunSummary};
use crate::scorer::RelevanceScorer;
use crate::sink::CorpusSink;
use crate::source::UnitStream;

/// Keywords taken from each seed text when none is configured.
pub const DEFAULT_KEYWORDS_PER_TEXT: usize = 5;

/// The outcome of a completed harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Number of terms in the expanded vocabulary.
    pub vocabulary_size: usize,
    pub summary: RunSummary,
}

/// Runs expansion then retrieval for one language.
///
/// # Example
///
/// ```rust,ignore
/// let job = HarvestJob::builder()
///     .registry(registry)
///     .language("en".parse()?)
///     .expansion(ExpansionConfig::builder().depth(1).breadth(5).min_similarity(0.5).build()?)
///     .options(PipelineOptions::builder().threshold(0.3).build()?)
///     .build()?;
///
/// let report = job.run(&["river".into()], &[], units, sink, &cancel).await?;
/// ```
pub struct HarvestJob {
    expander: KeywordExpander,
    language: LanguageTag,
    expansion: ExpansionConfig,
    options: PipelineOptions,
    scorer: RelevanceScorer,
    keywords_per_text: usize,
    concurrent: bool,
}

impl HarvestJob {
    pub fn builder() -> HarvestJobBuilder {
        HarvestJobBuilder::default()
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    /// Build the seed set from explicit terms plus the top RAKE keywords of
    /// each seed text. Duplicates after normalization are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if a term has no words or the
    /// resulting seed set is empty.
    pub fn seeds(&self, terms: &[String], seed_texts: &[String]) -> Result<Vec<SeedKeyword>> {
        let mut seeds = BTreeSet::new();
        for term in terms {
            seeds.insert(SeedKeyword::new(term, self.language.clone())?);
        }

        let stopwords = Stopwords::for_language(&self.language);
        for text in seed_texts {
            for keyword in extract_keywords(text, self.keywords_per_text, &self.language, &stopwords) {
                seeds.insert(SeedKeyword::new(&keyword, self.language.clone())?);
            }
        }

        if seeds.is_empty() {
            return Err(HarvestError::ConfigError("no seed keywords were given".to_string()));
        }
        info!(language = %self.language, seed_count = seeds.len(), "prepared seed keywords");
        Ok(seeds.into_iter().collect())
    }

    /// Expand `seeds` into a vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ModelUnavailable`] if expansion needs a model
    /// and none can be loaded for the job's language.
    pub async fn expand(&self, seeds: &[SeedKeyword]) -> Result<ExpandedVocabulary> {
        self.expander.expand(seeds, &self.language, &self.expansion).await
    }

    /// Retrieve from `source` into `sink` with an already expanded vocabulary.
    ///
    /// Uses the concurrent pipeline unless the job was built with
    /// `concurrent(false)`.
    pub async fn retrieve(
        &self,
        vocabulary: Arc<ExpandedVocabulary>,
        source: UnitStream,
        sink: Arc<dyn CorpusSink>,
        cancel: &CancellationToken,
    ) -> std::result::Result<HarvestReport, RunError> {
        let vocabulary_size = vocabulary.len();
        let pipeline = RetrievalPipeline::builder()
            .vocabulary(vocabulary)
            .sink(sink)
            .scorer(self.scorer)
            .options(self.options)
            .build()
            .map_err(|e| RunError::new(RunSummary::default(), e))?;

        let summary = if self.concurrent {
            pipeline.run_concurrent(source, cancel).await?
        } else {
            pipeline.run(source, cancel).await?
        };
        Ok(HarvestReport { vocabulary_size, summary })
    }

    /// Prepare seeds, expand them and run retrieval.
    ///
    /// # Errors
    ///
    /// Failures before retrieval starts are reported with an empty summary.
    pub async fn run(
        &self,
        terms: &[String],
        seed_texts: &[String],
        source: UnitStream,
        sink: Arc<dyn CorpusSink>,
        cancel: &CancellationToken,
    ) -> std::result::Result<HarvestReport, RunError> {
        let before_retrieval = |e| RunError::new(RunSummary::default(), e);
        let seeds = self.seeds(terms, seed_texts).map_err(before_retrieval)?;
        let vocabulary = self.expand(&seeds).await.map_err(before_retrieval)?;
        self.retrieve(Arc::new(vocabulary), source, sink, cancel).await
    }
}

/// Builder for constructing a [`HarvestJob`].
///
/// `registry`, `language`, `expansion` and `options` are required.
#[derive(Default)]
pub struct HarvestJobBuilder {
    registry: Option<Arc<OracleRegistry>>,
    language: Option<LanguageTag>,
    expansion: Option<ExpansionConfig>,
    options: Option<PipelineOptions>,
    scorer: Option<RelevanceScorer>,
    keywords_per_text: Option<usize>,
    concurrent: Option<bool>,
}

impl HarvestJobBuilder {
    pub fn registry(mut self, registry: Arc<OracleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn language(mut self, language: LanguageTag) -> Self {
        self.language = Some(language);
        self
    }

    pub fn expansion(mut self, expansion: ExpansionConfig) -> Self {
        self.expansion = Some(expansion);
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn scorer(mut self, scorer: RelevanceScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Keywords extracted from each seed text (default 5).
    pub fn keywords_per_text(mut self, count: usize) -> Self {
        self.keywords_per_text = Some(count);
        self
    }

    /// Whether retrieval uses the concurrent pipeline (default true).
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = Some(concurrent);
        self
    }

    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if a required part is missing
    /// or the configs are invalid. A missing model is only reported by
    /// [`HarvestJob::expand`], and never at depth 0.
    pub fn build(self) -> Result<HarvestJob> {
        let missing = |what: &str| HarvestError::ConfigError(format!("{what} is required"));
        let registry = self.registry.ok_or_else(|| missing("registry"))?;
        let language = self.language.ok_or_else(|| missing("language"))?;
        let expansion = self.expansion.ok_or_else(|| missing("expansion config"))?;
        let options = self.options.ok_or_else(|| missing("pipeline options"))?;
        expansion.validate()?;
        options.validate()?;

        Ok(HarvestJob {
            expander: KeywordExpander::new(registry),
            language,
            expansion,
            options,
            scorer: self.scorer.unwrap_or_default(),
            keywords_per_text: self.keywords_per_text.unwrap_or(DEFAULT_KEYWORDS_PER_TEXT),
            concurrent: self.concurrent.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{SourceLocator, TextUnit};
    use crate::oracle::InMemoryOracle;
    use crate::sink::InMemoryCorpusSink;
    use crate::source::units_from_iter;

    use super::*;

    fn en() -> LanguageTag {
        LanguageTag::new("en").unwrap()
    }

    fn job(concurrent: bool) -> HarvestJob {
        let oracle = InMemoryOracle::new()
            .with_neighbours("river", [("stream", 0.8), ("lake", 0.6), ("car", 0.2)]);
        let registry = OracleRegistry::builder().register_model(en(), Arc::new(oracle)).build();
        HarvestJob::builder()
            .registry(Arc::new(registry))
            .language(en())
            .expansion(ExpansionConfig::builder().depth(1).breadth(3).min_similarity(0.5).build().unwrap())
            .options(PipelineOptions::builder().threshold(0.3).workers(2).build().unwrap())
            .concurrent(concurrent)
            .build()
            .unwrap()
    }

    fn unit(id: &str, text: &str) -> TextUnit {
        TextUnit::new(text, SourceLocator::new(id, 0))
    }

    #[test]
    fn seeds_merge_terms_and_extracted_keywords() {
        let seeds = job(false)
            .seeds(&["River".into(), "river".into()], &["Flooding of the delta.".into()])
            .unwrap();
        let terms: Vec<_> = seeds.iter().map(|s| s.term()).collect();
        assert_eq!(terms, vec!["delta", "flooding", "river"]);
    }

    #[test]
    fn empty_seed_set_is_rejected() {
        let err = job(false).seeds(&[], &["the of and".into()]).unwrap_err();
        assert!(matches!(err, HarvestError::ConfigError(_)));
    }

    fn job_without_model(depth: u32) -> HarvestJob {
        HarvestJob::builder()
            .registry(Arc::new(OracleRegistry::builder().build()))
            .language(en())
            .expansion(ExpansionConfig::builder().depth(depth).breadth(1).min_similarity(0.5).build().unwrap())
            .options(PipelineOptions::builder().threshold(0.3).build().unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn missing_model_surfaces_as_model_unavailable() {
        let sink = Arc::new(InMemoryCorpusSink::new());
        let err = job_without_model(1)
            .run(&["river".into()], &[], units_from_iter(vec![]), sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err.error, HarvestError::ModelUnavailable { .. }), "{:?}", err.error);
        assert_eq!(err.summary, RunSummary::default());
    }

    #[tokio::test]
    async fn depth_zero_runs_without_a_model() {
        let sink = Arc::new(InMemoryCorpusSink::new());
        let report = job_without_model(0)
            .run(
                &["river".into()],
                &[],
                units_from_iter(vec![unit("a", "The river bank.")]),
                sink.clone(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(report.vocabulary_size, 1);
        assert_eq!(report.summary.accepted, 1);
        assert_eq!(sink.len().await, 1);
    }

    #[tokio::test]
    async fn run_expands_then_retrieves() {
        for concurrent in [false, true] {
            let sink = Arc::new(InMemoryCorpusSink::new());
            let units = vec![
                unit("a", "The river bank."),
                unit("b", "A car park."),
                unit("c", "The river bank!"),
            ];
            let report = job(concurrent)
                .run(
                    &["river".into()],
                    &[],
                    units_from_iter(units),
                    sink.clone(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap();

            assert_eq!(report.vocabulary_size, 3);
            assert_eq!(report.summary.fetched, 3);
            assert_eq!(report.summary.accepted, 1);
            assert_eq!(report.summary.rejected_low_score, 1);
            assert_eq!(report.summary.rejected_duplicate, 1);
            assert_eq!(sink.records().await[0].locator.document_id, "a");
        }
    }

    #[tokio::test]
    async fn seed_failure_reports_empty_summary() {
        let sink = Arc::new(InMemoryCorpusSink::new());
        let err = job(false)
            .run(&["!!".into()], &[], units_from_iter(vec![]), sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.summary, RunSummary::default());
        assert!(matches!(err.error, HarvestError::ConfigError(_)));
    }
}
