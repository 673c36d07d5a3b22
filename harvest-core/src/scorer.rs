//! Relevance scoring of text units against an expanded vocabulary.
//!
//! A unit's text is tokenized with the vocabulary's language rules. Every
//! vocabulary match adds `similarity / (1 + generation)`, and the sum is
//! normalized by length so long passages do not win on volume alone.
//! Multi-word terms match as contiguous token runs. Where phrases overlap,
//! the split of the text into matches with the highest total weight wins, so
//! a phrase never hides the larger weight of its own words.

use serde::{Deserialize, Serialize};

use crate::document::{ScoredUnit, TextUnit};
use crate::expander::ExpandedVocabulary;
use crate::normalize::tokenize;

/// Default number of tokens a unit may have before its score is length-normalized.
pub const DEFAULT_REFERENCE_LENGTH: usize = 8;

/// Scores text units; a pure function of its inputs.
///
/// The summed match weight is multiplied by
/// `min(1, reference_length / token_count)`: units up to `reference_length`
/// tokens keep their raw sum, longer units are normalized per token. With a
/// reference length of 1 the score is exactly the per-token average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScorer {
    reference_length: usize,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self { reference_length: DEFAULT_REFERENCE_LENGTH }
    }
}

impl RelevanceScorer {
    /// Create a scorer. A `reference_length` of 0 is treated as 1.
    pub fn new(reference_length: usize) -> Self {
        Self { reference_length: reference_length.max(1) }
    }

    pub fn reference_length(&self) -> usize {
        self.reference_length
    }

    /// Score `unit` against `vocabulary`.
    pub fn score(&self, unit: TextUnit, vocabulary: &ExpandedVocabulary) -> ScoredUnit {
        let (score, matched_terms) = self.score_text(&unit.raw_text, vocabulary);
        ScoredUnit { unit, score, matched_terms }
    }

    /// Score raw text, returning the score and matched terms.
    pub fn score_text(&self, text: &str, vocabulary: &ExpandedVocabulary) -> (f32, Vec<String>) {
        let tokens = tokenize(text, vocabulary.language());
        let max_len = vocabulary.max_phrase_len();
        if tokens.is_empty() || max_len == 0 {
            return (0.0, Vec::new());
        }

        // best[i]: highest total weight over tokens[i..], with the match
        // length chosen at i (0 when token i is skipped).
        let n = tokens.len();
        let mut best = vec![0.0f32; n + 1];
        let mut choice = vec![0usize; n];
        for i in (0..n).rev() {
            best[i] = best[i + 1];
            for len in (1..=max_len.min(n - i)).rev() {
                let Some(keyword) = vocabulary.get(&tokens[i..i + len].join(" ")) else {
                    continue;
                };
                let total = keyword.weight() + best[i + len];
                if total > best[i] || (choice[i] == 0 && total >= best[i]) {
                    best[i] = total;
                    choice[i] = len;
                }
            }
        }

        let mut matched: Vec<String> = Vec::new();
        let mut i = 0;
        while i < n {
            match choice[i] {
                0 => i += 1,
                len => {
                    let term = tokens[i..i + len].join(" ");
                    if !matched.contains(&term) {
                        matched.push(term);
                    }
                    i += len;
                }
            }
        }
        let total = best[0];

        if matched.is_empty() {
            return (0.0, matched);
        }
        let factor = (self.reference_length as f32 / tokens.len() as f32).min(1.0);
        (total * factor, matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceLocator;
    use crate::expander::ExpandedKeyword;
    use crate::language::LanguageTag;

    fn en() -> LanguageTag {
        LanguageTag::new("en").unwrap()
    }

    fn vocabulary(entries: &[(&str, f32, u32)]) -> ExpandedVocabulary {
        ExpandedVocabulary::from_keywords(
            en(),
            entries.iter().map(|&(term, similarity, generation)| ExpandedKeyword {
                term: term.to_string(),
                language: en(),
                similarity,
                generation,
            }),
        )
    }

    fn unit(text: &str) -> TextUnit {
        TextUnit::new(text, SourceLocator::new("doc", 0))
    }

    #[test]
    fn stream_scenario() {
        let vocab = vocabulary(&[("river", 1.0, 0), ("stream", 0.8, 1), ("lake", 0.6, 1)]);
        let scored = RelevanceScorer::default().score(unit("The stream flows north"), &vocab);
        assert!((scored.score - 0.4).abs() < 1e-6);
        assert_eq!(scored.matched_terms, vec!["stream"]);
    }

    #[test]
    fn per_token_normalization_with_unit_reference() {
        let vocab = vocabulary(&[("stream", 0.8, 1)]);
        let (score, _) = RelevanceScorer::new(1).score_text("The stream flows north", &vocab);
        assert!((score - 0.1).abs() < 1e-6);
    }

    #[test]
    fn no_match_scores_zero() {
        let vocab = vocabulary(&[("river", 1.0, 0)]);
        let scored = RelevanceScorer::default().score(unit("Mountains are tall."), &vocab);
        assert_eq!(scored.score, 0.0);
        assert!(scored.matched_terms.is_empty());

        let scored = RelevanceScorer::default().score(unit("  ... "), &vocab);
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn long_units_are_normalized() {
        let vocab = vocabulary(&[("river", 1.0, 0)]);
        let scorer = RelevanceScorer::new(4);
        let (short, _) = scorer.score_text("river banks flood often", &vocab);
        let (long, _) = scorer.score_text("river banks flood often in rainy spring months", &vocab);
        assert!((short - 1.0).abs() < 1e-6);
        assert!((long - 0.5).abs() < 1e-6);
    }

    #[test]
    fn overlapping_matches_take_the_heaviest_split() {
        let vocab = vocabulary(&[("flood", 0.9, 1), ("flood plain", 0.8, 1), ("river", 1.0, 0)]);
        let (score, matched) = RelevanceScorer::default()
            .score_text("River flood plain, river flood.", &vocab);
        assert_eq!(matched, vec!["river", "flood"]);
        let expected = 1.0 + 0.45 + 1.0 + 0.45;
        assert!((score - expected).abs() < 1e-5);
    }

    #[test]
    fn heavier_phrase_beats_its_words() {
        let vocab = vocabulary(&[("flood", 0.9, 1), ("flood plain", 1.0, 0), ("river", 1.0, 0)]);
        let (score, matched) = RelevanceScorer::default()
            .score_text("River flood plain, river flood.", &vocab);
        assert_eq!(matched, vec!["river", "flood plain", "flood"]);
        let expected = 1.0 + 1.0 + 1.0 + 0.45;
        assert!((score - expected).abs() < 1e-5);
    }

    #[test]
    fn completing_a_phrase_never_lowers_the_score() {
        let vocab = vocabulary(&[("flood", 1.0, 0), ("plain", 1.0, 0), ("flood plain", 0.9, 1)]);
        let scorer = RelevanceScorer::default();
        let (before, _) = scorer.score_text("flood meadow", &vocab);
        let (after, matched) = scorer.score_text("flood plain", &vocab);
        assert!((before - 1.0).abs() < 1e-6);
        assert!((after - 2.0).abs() < 1e-6);
        assert_eq!(matched, vec!["flood", "plain"]);
    }

    #[test]
    fn matching_is_accent_and_case_insensitive() {
        let vocab = vocabulary(&[("cafe", 1.0, 0)]);
        let (score, matched) = RelevanceScorer::default().score_text("CAFÉ culture", &vocab);
        assert!(score > 0.0);
        assert_eq!(matched, vec!["cafe"]);
    }
}
