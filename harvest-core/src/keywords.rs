//! RAKE keyword extraction for growing a seed set from reference text.
//!
//! Candidate phrases are maximal runs of words between stopwords and
//! punctuation. Each word scores `degree / frequency` over all candidates,
//! and a phrase scores the sum of its words.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::language::LanguageTag;
use crate::normalize::normalize_word;

const EN_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may",
    "me", "more", "most", "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours",
];

const DE_STOPWORDS: &[&str] = &[
    "aber", "alle", "als", "also", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "bist",
    "da", "damit", "dann", "das", "dass", "dem", "den", "der", "des", "die", "dies", "diese",
    "dieser", "doch", "dort", "du", "durch", "ein", "eine", "einem", "einen", "einer", "eines",
    "er", "es", "für", "hat", "hatte", "ich", "ihr", "im", "in", "ist", "ja", "kann", "mit",
    "nach", "nicht", "noch", "nur", "ob", "oder", "sich", "sie", "sind", "so", "über", "um",
    "und", "uns", "unter", "vom", "von", "vor", "war", "waren", "was", "wie", "wir", "wird",
    "wurde", "wurden", "zu", "zum", "zur",
];

/// A normalized stopword list for one language.
#[derive(Debug, Clone, Default)]
pub struct Stopwords {
    words: HashSet<String>,
}

impl Stopwords {
    /// The built-in list for `language`; empty for unsupported languages.
    pub fn for_language(language: &LanguageTag) -> Self {
        let list: &[&str] = match language.primary() {
            "en" => EN_STOPWORDS,
            "de" => DE_STOPWORDS,
            _ => &[],
        };
        Self::from_words(list.iter().copied(), language)
    }

    /// Build a list from custom words, normalized for `language`.
    pub fn from_words<'a>(words: impl IntoIterator<Item = &'a str>, language: &LanguageTag) -> Self {
        Self { words: words.into_iter().map(|w| normalize_word(w, language)).collect() }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Split text into normalized candidate phrases.
fn candidate_phrases(text: &str, language: &LanguageTag, stopwords: &Stopwords) -> Vec<Vec<String>> {
    let mut phrases = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut word = String::new();

    let flush_word = |word: &mut String, current: &mut Vec<String>, phrases: &mut Vec<Vec<String>>| {
        if word.is_empty() {
            return;
        }
        let normalized = normalize_word(word, language);
        word.clear();
        let numeric = normalized.chars().all(|c| c.is_ascii_digit());
        if stopwords.contains(&normalized) || numeric {
            if !current.is_empty() {
                phrases.push(std::mem::take(current));
            }
        } else {
            current.push(normalized);
        }
    };

    for c in text.chars() {
        if c.is_alphanumeric() || c == '\'' || c == '-' {
            word.push(c);
        } else {
            flush_word(&mut word, &mut current, &mut phrases);
            if !c.is_whitespace() && !current.is_empty() {
                phrases.push(std::mem::take(&mut current));
            }
        }
    }
    flush_word(&mut word, &mut current, &mut phrases);
    if !current.is_empty() {
        phrases.push(current);
    }
    phrases
}

/// Extract up to `max_keywords` key phrases from `text`, best first.
///
/// Ties are broken by phrase text so the output is deterministic. Each
/// phrase appears once.
pub fn extract_keywords(
    text: &str,
    max_keywords: usize,
    language: &LanguageTag,
    stopwords: &Stopwords,
) -> Vec<String> {
    let phrases = candidate_phrases(text, language, stopwords);

    let mut frequency: HashMap<&str, f32> = HashMap::new();
    let mut degree: HashMap<&str, f32> = HashMap::new();
    for phrase in &phrases {
        for word in phrase {
            *frequency.entry(word.as_str()).or_default() += 1.0;
            *degree.entry(word.as_str()).or_default() += phrase.len() as f32;
        }
    }

    let mut scored: BTreeMap<String, f32> = BTreeMap::new();
    for phrase in &phrases {
        let score: f32 = phrase.iter().map(|w| degree[w.as_str()] / frequency[w.as_str()]).sum();
        scored.insert(phrase.join(" "), score);
    }

    let mut ranked: Vec<(String, f32)> = scored.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(max_keywords).map(|(phrase, _)| phrase).collect()
}
