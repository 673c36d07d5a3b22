//! Seed-keyword corpus harvesting.
//!
//! This crate provides:
//! - Breadth-first keyword expansion over word-embedding neighbours
//! - Lazily loaded, per-language embedding models
//! - Relevance scoring of text units against an expanded vocabulary
//! - A streaming retrieval pipeline with run-wide deduplication
//! - Append-only corpus sinks and JSON-lines document sources
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use harvest_core::*;
//!
//! let registry = OracleRegistry::builder()
//!     .register("en".parse()?, Arc::new(VectorFileLoader::new("models")))
//!     .build();
//!
//! let job = HarvestJob::builder()
//!     .registry(Arc::new(registry))
//!     .language("en".parse()?)
//!     .expansion(ExpansionConfig::builder().depth(1).breadth(5).min_similarity(0.5).build()?)
//!     .options(PipelineOptions::builder().threshold(0.3).build()?)
//!     .build()?;
//!
//! let documents = JsonlDocumentSource::open("docs.jsonl").await?;
//! let units = units_from_documents(documents, SplitOptions::default());
//! let sink = Arc::new(JsonlCorpusSink::open("corpus.jsonl").await?);
//! let report = job.run(&["river".into()], &[], units, sink, &CancellationToken::new()).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod error;
pub mod expander;
pub mod job;
pub mod keywords;
pub mod language;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod scorer;
pub mod sink;
pub mod source;
pub mod vectors;

pub use chunking::{UnitGranularity, UnitSplitter};
pub use config::{
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, ExpansionConfig,
    ExpansionConfigBuilder, PipelineOptions, PipelineOptionsBuilder,
};
pub use document::{CorpusRecord, Document, ScoredUnit, SourceLocator, TextUnit};
pub use error::{HarvestError, Result, RunError};
pub use expander::{ExpandedKeyword, ExpandedVocabulary, KeywordExpander, SeedKeyword};
pub use job::{DEFAULT_KEYWORDS_PER_TEXT, HarvestJob, HarvestJobBuilder, HarvestReport};
pub use keywords::{Stopwords, extract_keywords};
pub use language::LanguageTag;
pub use normalize::{Fingerprint, clean_wiki_text, normalize_term, tokenize};
pub use oracle::{
    EmbeddingOracle, InMemoryOracle, ModelLoader, Neighbor, OracleRegistry, OracleRegistryBuilder,
    ReadyModel,
};
pub use pipeline::{RetrievalPipeline, RetrievalPipelineBuilder, RunSummary, SeenSet};
pub use scorer::{DEFAULT_REFERENCE_LENGTH, RelevanceScorer};
pub use sink::{CorpusSink, InMemoryCorpusSink, JsonlCorpusSink};
pub use source::{
    DocumentStream, JsonlDocumentSource, SplitOptions, UnitStream, units_from_documents,
    units_from_iter,
};
pub use vectors::{VectorFileLoader, VectorFileOracle};

pub use tokio_util::sync::CancellationToken;
