//! The TOML run file.
//!
//! Domain parameters are required; only execution tunables under
//! `[pipeline]` fall back to defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use harvest_core::{
    ExpansionConfig, HarvestJob, LanguageTag, OracleRegistry, PipelineOptions, RelevanceScorer,
    SplitOptions, UnitGranularity, VectorFileLoader,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFileConfig {
    pub language: LanguageTag,
    pub seeds: Vec<String>,
    /// Reference texts whose top keywords join the seeds.
    #[serde(default)]
    pub seed_texts: Vec<String>,
    pub depth: u32,
    pub breadth: usize,
    pub min_similarity: f32,
    pub threshold: f32,
    pub granularity: UnitGranularity,
    /// Strip wiki citation markers before splitting documents.
    #[serde(default)]
    pub clean_wiki_markup: bool,
    pub models: ModelsSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsSection {
    pub dir: PathBuf,
    #[serde(default)]
    pub max_words: Option<usize>,
    /// File name around the language tag, e.g. `["cc.", ".300.vec"]`.
    #[serde(default)]
    pub file_pattern: Option<(String, String)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub progress_interval: Option<u64>,
    pub reference_length: Option<usize>,
    pub keywords_per_text: Option<usize>,
    pub concurrent: Option<bool>,
}

impl RunFileConfig {
    /// Read and parse a run file.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read run config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid run config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn expansion(&self) -> Result<ExpansionConfig> {
        Ok(ExpansionConfig::builder()
            .depth(self.depth)
            .breadth(self.breadth)
            .min_similarity(self.min_similarity)
            .build()?)
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let mut builder = PipelineOptions::builder().threshold(self.threshold);
        if let Some(workers) = self.pipeline.workers {
            builder = builder.workers(workers);
        }
        if let Some(capacity) = self.pipeline.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(interval) = self.pipeline.progress_interval {
            builder = builder.progress_interval(interval);
        }
        Ok(builder.build()?)
    }

    pub fn split_options(&self) -> SplitOptions {
        SplitOptions { granularity: self.granularity, clean_wiki_markup: self.clean_wiki_markup }
    }

    /// A registry with a lazily loaded vector-file model for the run language.
    pub fn registry(&self) -> OracleRegistry {
        let mut loader =
            VectorFileLoader::new(&self.models.dir).with_max_words(self.models.max_words);
        if let Some((prefix, suffix)) = &self.models.file_pattern {
            loader = loader.with_file_pattern(prefix, suffix);
        }
        OracleRegistry::builder().register(self.language.clone(), Arc::new(loader)).build()
    }

    pub fn job(&self) -> Result<HarvestJob> {
        let mut builder = HarvestJob::builder()
            .registry(Arc::new(self.registry()))
            .language(self.language.clone())
            .expansion(self.expansion()?)
            .options(self.pipeline_options()?);
        if let Some(length) = self.pipeline.reference_length {
            builder = builder.scorer(RelevanceScorer::new(length));
        }
        if let Some(count) = self.pipeline.keywords_per_text {
            builder = builder.keywords_per_text(count);
        }
        if let Some(concurrent) = self.pipeline.concurrent {
            builder = builder.concurrent(concurrent);
        }
        Ok(builder.build()?)
    }
}
