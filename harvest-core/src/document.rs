//! Data types for source documents, text units and corpus records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::LanguageTag;

/// A source document before it is split into text units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (e.g. an article title or page id).
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Language of the document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageTag>,
}

/// Where a text unit came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Identifier of the parent document.
    pub document_id: String,
    /// Byte offset of the unit inside the parent document's text.
    pub offset: usize,
}

impl SourceLocator {
    pub fn new(document_id: impl Into<String>, offset: usize) -> Self {
        Self { document_id: document_id.into(), offset }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.offset)
    }
}

/// A candidate passage pulled from the source corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub raw_text: String,
    pub locator: SourceLocator,
    pub language_hint: Option<LanguageTag>,
}

impl TextUnit {
    pub fn new(raw_text: impl Into<String>, locator: SourceLocator) -> Self {
        Self { raw_text: raw_text.into(), locator, language_hint: None }
    }

    pub fn with_language(mut self, language: LanguageTag) -> Self {
        self.language_hint = Some(language);
        self
    }
}

/// A [`TextUnit`] with its relevance score and the vocabulary terms it matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUnit {
    pub unit: TextUnit,
    /// Length-normalized relevance score (0 when nothing matched).
    pub score: f32,
    /// Matched vocabulary terms, unique, in order of first occurrence.
    pub matched_terms: Vec<String>,
}

/// An accepted passage with provenance, as persisted by a corpus sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub text: String,
    pub locator: SourceLocator,
    pub matched_terms: Vec<String>,
    pub score: f32,
    pub timestamp: DateTime<Utc>,
}

impl CorpusRecord {
    /// Build a record from an accepted unit, stamped with the current time.
    pub fn from_scored(scored: ScoredUnit) -> Self {
        Self {
            text: scored.unit.raw_text,
            locator: scored.unit.locator,
            matched_terms: scored.matched_terms,
            score: scored.score,
            timestamp: Utc::now(),
        }
    }
}
