//! Breadth-first keyword expansion over the embedding similarity graph.
//!
//! Seeds form generation 0 with similarity 1.0. Each following generation
//! asks the oracle for the top-`breadth` neighbours of every term accepted in
//! the previous generation. A neighbour's similarity is the edge similarity
//! capped at its parent's similarity, so similarity never grows along a
//! chain and every accepted term stays at or above `min_similarity`.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_core::{ExpansionConfig, KeywordExpander, SeedKeyword};
//!
//! let expander = KeywordExpander::new(Arc::new(registry));
//! let config = ExpansionConfig::builder().depth(2).breadth(5).min_similarity(0.5).build()?;
//! let seeds = vec![SeedKeyword::new("river", en.clone())?];
//! let vocabulary = expander.expand(&seeds, &en, &config).await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ExpansionConfig;
use crate::error::{HarvestError, Result};
use crate::language::LanguageTag;
use crate::normalize::normalize_term;
use crate::oracle::OracleRegistry;

/// A user-supplied keyword defining the domain of interest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedKeyword {
    term: String,
    language: LanguageTag,
}

impl SeedKeyword {
    /// Create a seed, normalizing the term for its language.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the term contains no words.
    pub fn new(term: &str, language: LanguageTag) -> Result<Self> {
        let normalized = normalize_term(term, &language);
        if normalized.is_empty() {
            return Err(HarvestError::ConfigError(format!("seed keyword '{term}' has no words")));
        }
        Ok(Self { term: normalized, language })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }
}

/// A vocabulary term with its similarity to the seeds and its generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedKeyword {
    pub term: String,
    pub language: LanguageTag,
    /// Similarity in `[0, 1]`; seeds have 1.0.
    pub similarity: f32,
    /// Expansion generation; 0 for seeds.
    pub generation: u32,
}

impl ExpandedKeyword {
    /// Scoring weight: similarity decayed by generation.
    pub fn weight(&self) -> f32 {
        self.similarity / (1.0 + self.generation as f32)
    }

    /// Whether `self` should replace `other` for the same term.
    ///
    /// Higher similarity wins; equal similarity prefers the lower generation.
    fn outranks(&self, other: &ExpandedKeyword) -> bool {
        self.similarity > other.similarity
            || (self.similarity == other.similarity && self.generation < other.generation)
    }
}

/// An immutable `term → keyword` mapping for one seed set and language.
///
/// Terms are stored in normalized form and iterate in sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedVocabulary {
    language: LanguageTag,
    entries: BTreeMap<String, ExpandedKeyword>,
    max_phrase_len: usize,
}

impl ExpandedVocabulary {
    /// Build a vocabulary from keywords, deduplicating by normalized term.
    ///
    /// On collision the higher similarity is kept (lower generation on ties).
    /// Keywords in another language or without words are ignored.
    pub fn from_keywords(
        language: LanguageTag,
        keywords: impl IntoIterator<Item = ExpandedKeyword>,
    ) -> Self {
        let mut entries: BTreeMap<String, ExpandedKeyword> = BTreeMap::new();
        for mut keyword in keywords {
            if keyword.language != language {
                continue;
            }
            let term = normalize_term(&keyword.term, &language);
            if term.is_empty() {
                continue;
            }
            keyword.term = term.clone();
            match entries.get(&term) {
                Some(existing) if !keyword.outranks(existing) => {}
                _ => {
                    entries.insert(term, keyword);
                }
            }
        }
        Self::from_entries(language, entries)
    }

    fn from_entries(language: LanguageTag, entries: BTreeMap<String, ExpandedKeyword>) -> Self {
        let max_phrase_len =
            entries.keys().map(|term| term.split(' ').count()).max().unwrap_or(0);
        Self { language, entries, max_phrase_len }
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    /// Look up a normalized term.
    pub fn get(&self, term: &str) -> Option<&ExpandedKeyword> {
        self.entries.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keywords in term order.
    pub fn iter(&self) -> impl Iterator<Item = &ExpandedKeyword> {
        self.entries.values()
    }

    /// The longest term, in words.
    pub fn max_phrase_len(&self) -> usize {
        self.max_phrase_len
    }
}

/// Expands seed keywords through an [`OracleRegistry`].
pub struct KeywordExpander {
    registry: Arc<OracleRegistry>,
}

impl KeywordExpander {
    pub fn new(registry: Arc<OracleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<OracleRegistry> {
        &self.registry
    }

    /// Expand `seeds` into a vocabulary for `language`.
    ///
    /// Expansion stops after `config.depth` generations or as soon as a
    /// generation adds nothing. Out-of-vocabulary terms simply contribute no
    /// neighbours. With depth 0 the seeds are returned without consulting
    /// the oracle.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] for an empty seed set, a seed in
    /// another language or an invalid config, and
    /// [`HarvestError::ModelUnavailable`] if no model can be loaded for
    /// `language`.
    pub async fn expand(
        &self,
        seeds: &[SeedKeyword],
        language: &LanguageTag,
        config: &ExpansionConfig,
    ) -> Result<ExpandedVocabulary> {
        config.validate()?;
        if seeds.is_empty() {
            return Err(HarvestError::ConfigError("at least one seed keyword is required".into()));
        }
        if let Some(seed) = seeds.iter().find(|s| s.language() != language) {
            return Err(HarvestError::ConfigError(format!(
                "seed '{}' is tagged '{}' but expansion language is '{language}'",
                seed.term(),
                seed.language()
            )));
        }

        let mut entries: BTreeMap<String, ExpandedKeyword> = seeds
            .iter()
            .map(|seed| {
                let keyword = ExpandedKeyword {
                    term: seed.term().to_string(),
                    language: language.clone(),
                    similarity: 1.0,
                    generation: 0,
                };
                (seed.term().to_string(), keyword)
            })
            .collect();

        if config.depth > 0 {
            // Fail fast on a missing model even if every seed is out of vocabulary.
            self.registry.model(language).await?;
        }

        let mut frontier: Vec<String> = entries.keys().cloned().collect();
        for generation in 1..=config.depth {
            let mut proposals: BTreeMap<String, f32> = BTreeMap::new();
            for parent in &frontier {
                let parent_similarity = entries.get(parent).map_or(0.0, |k| k.similarity);
                let neighbours =
                    match self.registry.nearest(parent, config.breadth, language).await {
                        Ok(neighbours) => neighbours,
                        Err(e) if e.is_recoverable() => {
                            debug!(term = %parent, generation, "term has no neighbours");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                for neighbour in neighbours {
                    let term = normalize_term(&neighbour.term, language);
                    if term.is_empty() || term == *parent {
                        continue;
                    }
                    let similarity = neighbour.similarity.min(parent_similarity);
                    if similarity < config.min_similarity {
                        continue;
                    }
                    let best = proposals.entry(term).or_insert(similarity);
                    if similarity > *best {
                        *best = similarity;
                    }
                }
            }

            let mut accepted = Vec::new();
            for (term, similarity) in proposals {
                let candidate = ExpandedKeyword {
                    term: term.clone(),
                    language: language.clone(),
                    similarity,
                    generation,
                };
                if let Some(existing) = entries.get(&term) {
                    if existing.similarity >= similarity {
                        continue;
                    }
                }
                entries.insert(term.clone(), candidate);
                accepted.push(term);
            }

            info!(
                language = %language,
                generation,
                frontier = frontier.len(),
                accepted = accepted.len(),
                "expanded generation"
            );
            if accepted.is_empty() {
                break;
            }
            frontier = accepted;
        }

        let vocabulary = ExpandedVocabulary::from_entries(language.clone(), entries);
        info!(language = %language, seeds = seeds.len(), terms = vocabulary.len(), "expansion complete");
        Ok(vocabulary)
    }
}
