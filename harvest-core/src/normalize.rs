//! Language-aware text normalization shared by the expander, the scorer and
//! content fingerprinting.
//!
//! Normalization lowercases, segments text into Unicode words and folds
//! Latin diacritics to their base letters. German folds umlauts to their
//! two-letter spellings (`ü` → `ue`) so that `Müller` and `Mueller` agree.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use crate::language::LanguageTag;

/// Split `text` into normalized word tokens.
///
/// Punctuation and whitespace are dropped; tokens that normalize to an empty
/// string are skipped.
pub fn tokenize(text: &str, language: &LanguageTag) -> Vec<String> {
    text.unicode_words()
        .map(|word| normalize_word(word, language))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Normalize a (possibly multi-word) term into its canonical space-joined form.
///
/// Returns an empty string if the term contains no words.
pub fn normalize_term(term: &str, language: &LanguageTag) -> String {
    tokenize(term, language).join(" ")
}

/// Normalize a single word: lowercase, then fold diacritics.
pub fn normalize_word(word: &str, language: &LanguageTag) -> String {
    let german = language.primary() == "de";
    let mut out = String::with_capacity(word.len());
    for c in word.chars().flat_map(char::to_lowercase) {
        if german {
            match c {
                'ä' => {
                    out.push_str("ae");
                    continue;
                }
                'ö' => {
                    out.push_str("oe");
                    continue;
                }
                'ü' => {
                    out.push_str("ue");
                    continue;
                }
                _ => {}
            }
        }
        match fold_char(c) {
            Some(folded) => out.push_str(folded),
            None => out.push(c),
        }
    }
    out
}

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' | 'ĉ' | 'ċ' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' | 'ĝ' | 'ġ' | 'ģ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ř' => "r",
        'ś' | 'š' | 'ş' | 'ŝ' => "s",
        'ß' => "ss",
        'ţ' | 'ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// A content fingerprint used for run-wide deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprint the normalized token sequence of `text`.
    ///
    /// Texts that differ only in case, punctuation, whitespace or diacritics
    /// share a fingerprint.
    pub fn of(text: &str, language: &LanguageTag) -> Self {
        let mut hasher = Sha256::new();
        for (i, token) in tokenize(text, language).iter().enumerate() {
            if i > 0 {
                hasher.update(b" ");
            }
            hasher.update(token.as_bytes());
        }
        let digest = hasher.finalize();
        let mut head = [0u8; 16];
        head.copy_from_slice(&digest[..16]);
        Self(u128::from_be_bytes(head))
    }
}

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[(?:[0-9]*[a-z]*|citation needed)\]").expect("citation pattern is valid")
    })
}

fn inline_space_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t\u{a0}]+").expect("space pattern is valid"))
}

/// Strip wiki rendering artefacts from article text.
///
/// Removes citation markers (`[12]`, `[a]`, `[citation needed]`) and
/// backslashes, turns non-breaking spaces into plain spaces and collapses
/// runs of inline whitespace. Line breaks are kept so paragraph structure
/// survives.
pub fn clean_wiki_text(text: &str) -> String {
    let without_refs = citation_pattern().replace_all(text, "");
    let without_escapes = without_refs.replace('\\', "");
    without_escapes
        .lines()
        .map(|line| inline_space_pattern().replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(tag: &str) -> LanguageTag {
        LanguageTag::new(tag).unwrap()
    }

    #[test]
    fn tokenize_lowercases_and_drops_punctuation() {
        assert_eq!(tokenize("The Stream, flows north!", &lang("en")), vec![
            "the", "stream", "flows", "north"
        ]);
    }

    #[test]
    fn folds_diacritics_per_language() {
        assert_eq!(normalize_word("Café", &lang("fr")), "cafe");
        assert_eq!(normalize_word("Müller", &lang("en")), "muller");
        assert_eq!(normalize_word("Müller", &lang("de")), "mueller");
        assert_eq!(normalize_word("Straße", &lang("de")), "strasse");
    }

    #[test]
    fn leaves_non_latin_scripts_alone() {
        assert_eq!(normalize_word("Река", &lang("ru")), "река");
    }

    #[test]
    fn normalize_term_joins_words() {
        assert_eq!(normalize_term("  River  Basin ", &lang("en")), "river basin");
        assert_eq!(normalize_term("--", &lang("en")), "");
    }

    #[test]
    fn fingerprint_ignores_surface_differences() {
        let en = lang("en");
        let a = Fingerprint::of("The stream flows north.", &en);
        let b = Fingerprint::of("the  STREAM flows   north", &en);
        let c = Fingerprint::of("The stream flows south.", &en);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn clean_wiki_text_strips_citations() {
        let raw = "Rivers[1] carry water[a].\u{a0}They flow\\ downhill[citation needed].\n\nSecond   paragraph.";
        assert_eq!(
            clean_wiki_text(raw),
            "Rivers carry water. They flow downhill.\n\nSecond paragraph."
        );
    }
}
