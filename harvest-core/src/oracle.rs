//! Nearest-neighbour oracle over per-language word-embedding models.
//!
//! An [`EmbeddingOracle`] is one loaded model. A [`ModelLoader`] knows how to
//! load the model for a language, and the [`OracleRegistry`] maps language
//! tags to loaders, loading each model lazily on first use and caching it for
//! the registry's lifetime.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_core::{OracleRegistry, VectorFileLoader};
//!
//! let registry = OracleRegistry::builder()
//!     .register("en".parse()?, Arc::new(VectorFileLoader::new("models")))
//!     .build();
//! let neighbours = registry.nearest("river", 5, &"en".parse()?).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::error::{HarvestError, Result};
use crate::language::LanguageTag;

/// A neighbouring term and its similarity to the query term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub term: String,
    /// Similarity in `[0, 1]` (higher is closer).
    pub similarity: f32,
}

impl Neighbor {
    pub fn new(term: impl Into<String>, similarity: f32) -> Self {
        Self { term: term.into(), similarity }
    }
}

/// One loaded embedding model answering nearest-neighbour queries.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Return up to `k` neighbours of `term`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::UnknownTerm`] if `term` is out of vocabulary.
    async fn nearest(&self, term: &str, k: usize) -> Result<Vec<Neighbor>>;
}

/// Loads the embedding model for a language.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model for `language`.
    ///
    /// # Errors
    ///
    /// Any error is reported to callers as [`HarvestError::ModelUnavailable`].
    async fn load(&self, language: &LanguageTag) -> Result<Arc<dyn EmbeddingOracle>>;
}

/// A loader that hands out an already constructed model.
pub struct ReadyModel(Arc<dyn EmbeddingOracle>);

impl ReadyModel {
    pub fn new(model: Arc<dyn EmbeddingOracle>) -> Self {
        Self(model)
    }
}

#[async_trait]
impl ModelLoader for ReadyModel {
    async fn load(&self, _language: &LanguageTag) -> Result<Arc<dyn EmbeddingOracle>> {
        Ok(Arc::clone(&self.0))
    }
}

struct ModelSlot {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn EmbeddingOracle>>,
}

/// Explicit `language → model` registration with a lazy, load-once cache.
///
/// Concurrent first lookups for the same language trigger a single load.
/// A failed load leaves the slot empty so a later lookup may retry.
pub struct OracleRegistry {
    slots: HashMap<LanguageTag, ModelSlot>,
}

impl OracleRegistry {
    /// Create a new [`OracleRegistryBuilder`].
    pub fn builder() -> OracleRegistryBuilder {
        OracleRegistryBuilder::default()
    }

    /// Whether a loader is registered for `language`.
    pub fn supports(&self, language: &LanguageTag) -> bool {
        self.slots.contains_key(language)
    }

    /// The registered languages, sorted.
    pub fn languages(&self) -> Vec<&LanguageTag> {
        let mut languages: Vec<_> = self.slots.keys().collect();
        languages.sort();
        languages
    }

    /// Return the model for `language`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ModelUnavailable`] if nothing is registered
    /// for `language` or the loader fails.
    pub async fn model(&self, language: &LanguageTag) -> Result<Arc<dyn EmbeddingOracle>> {
        let slot = self.slots.get(language).ok_or_else(|| HarvestError::ModelUnavailable {
            language: language.to_string(),
            message: "no embedding model registered".to_string(),
        })?;

        let model = slot
            .model
            .get_or_try_init(|| async {
                info!(language = %language, "loading embedding model");
                slot.loader.load(language).await.map_err(|e| {
                    error!(language = %language, error = %e, "failed to load embedding model");
                    match e {
                        HarvestError::ModelUnavailable { .. } => e,
                        other => HarvestError::ModelUnavailable {
                            language: language.to_string(),
                            message: other.to_string(),
                        },
                    }
                })
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// Return up to `k` neighbours of `term` in `language`, most similar first.
    ///
    /// Similarities are clamped into `[0, 1]`; equal similarities are ordered
    /// by term so results are deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ModelUnavailable`] when no model can be loaded
    /// for `language`, and [`HarvestError::UnknownTerm`] when `term` is out
    /// of vocabulary.
    pub async fn nearest(
        &self,
        term: &str,
        k: usize,
        language: &LanguageTag,
    ) -> Result<Vec<Neighbor>> {
        let model = self.model(language).await?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut neighbours = model.nearest(term, k).await.map_err(|e| match e {
            HarvestError::UnknownTerm { term, .. } => {
                HarvestError::UnknownTerm { term, language: language.to_string() }
            }
            other => other,
        })?;

        for neighbour in &mut neighbours {
            neighbour.similarity = clamp_similarity(neighbour.similarity);
        }
        neighbours.sort_by(|a, b| {
            b.similarity.total_cmp(&a.similarity).then_with(|| a.term.cmp(&b.term))
        });
        neighbours.truncate(k);
        debug!(term, language = %language, count = neighbours.len(), "nearest neighbours");
        Ok(neighbours)
    }
}

fn clamp_similarity(similarity: f32) -> f32 {
    if similarity.is_nan() { 0.0 } else { similarity.clamp(0.0, 1.0) }
}

/// Builder for constructing an [`OracleRegistry`].
#[derive(Default)]
pub struct OracleRegistryBuilder {
    loaders: HashMap<LanguageTag, Arc<dyn ModelLoader>>,
}

impl OracleRegistryBuilder {
    /// Register the loader for `language`, replacing any earlier registration.
    pub fn register(mut self, language: LanguageTag, loader: Arc<dyn ModelLoader>) -> Self {
        self.loaders.insert(language, loader);
        self
    }

    /// Register an already loaded model for `language`.
    pub fn register_model(self, language: LanguageTag, model: Arc<dyn EmbeddingOracle>) -> Self {
        self.register(language, Arc::new(ReadyModel::new(model)))
    }

    pub fn build(self) -> OracleRegistry {
        let slots = self
            .loaders
            .into_iter()
            .map(|(language, loader)| (language, ModelSlot { loader, model: OnceCell::new() }))
            .collect();
        OracleRegistry { slots }
    }
}

/// A model with a fixed neighbour table.
///
/// Useful for tests, demos and small curated thesauri.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOracle {
    neighbours: HashMap<String, Vec<Neighbor>>,
}

impl InMemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the neighbours of `term`. The term becomes part of the vocabulary
    /// even if `neighbours` is empty.
    pub fn with_neighbours<I, S>(mut self, term: impl Into<String>, neighbours: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let list = neighbours.into_iter().map(|(t, s)| Neighbor::new(t, s)).collect();
        self.neighbours.insert(term.into(), list);
        self
    }
}

#[async_trait]
impl EmbeddingOracle for InMemoryOracle {
    async fn nearest(&self, term: &str, k: usize) -> Result<Vec<Neighbor>> {
        let list = self.neighbours.get(term).ok_or_else(|| HarvestError::UnknownTerm {
            term: term.to_string(),
            language: String::new(),
        })?;
        let mut list = list.clone();
        list.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.term.cmp(&b.term)));
        list.truncate(k);
        Ok(list)
    }
}
