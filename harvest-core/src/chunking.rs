//! Splitting documents into text units.
//!
//! - [`UnitGranularity::Paragraph`] splits on blank lines.
//! - [`UnitGranularity::Sentence`] further splits paragraphs after `.`, `!`
//!   or `?` followed by whitespace.
//!
//! Units carry the byte offset of their first character in the document text.

use serde::{Deserialize, Serialize};

use crate::document::{Document, SourceLocator, TextUnit};

/// The size of the passages retrieved from each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitGranularity {
    #[default]
    Paragraph,
    Sentence,
}

/// Splits documents into [`TextUnit`]s at a fixed granularity.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitSplitter {
    granularity: UnitGranularity,
}

impl UnitSplitter {
    pub fn new(granularity: UnitGranularity) -> Self {
        Self { granularity }
    }

    pub fn granularity(&self) -> UnitGranularity {
        self.granularity
    }

    /// Split a document. Whitespace-only segments are skipped, so an empty
    /// document yields no units.
    pub fn split(&self, document: &Document) -> Vec<TextUnit> {
        let spans = match self.granularity {
            UnitGranularity::Paragraph => paragraph_spans(&document.text),
            UnitGranularity::Sentence => paragraph_spans(&document.text)
                .into_iter()
                .flat_map(|(start, end)| {
                    sentence_spans(&document.text[start..end])
                        .into_iter()
                        .map(move |(s, e)| (start + s, start + e))
                })
                .collect(),
        };

        spans
            .into_iter()
            .map(|(start, end)| {
                let unit = TextUnit::new(
                    &document.text[start..end],
                    SourceLocator::new(document.id.clone(), start),
                );
                match &document.language {
                    Some(language) => unit.with_language(language.clone()),
                    None => unit,
                }
            })
            .collect()
    }
}

/// Trim a byte span to its non-whitespace content; `None` if nothing is left.
fn trimmed(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let segment = &text[start..end];
    let leading = segment.len() - segment.trim_start().len();
    let content = segment.trim();
    if content.is_empty() {
        return None;
    }
    Some((start + leading, start + leading + content.len()))
}

fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            spans.extend(trimmed(text, start, offset));
            start = offset + line.len();
        }
        offset += line.len();
    }
    spans.extend(trimmed(text, start, text.len()));
    spans
}

fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_idx, next)) = chars.peek() {
                if next.is_whitespace() {
                    spans.extend(trimmed(text, start, next_idx));
                    start = next_idx;
                }
            } else {
                spans.extend(trimmed(text, start, idx + c.len_utf8()));
                start = text.len();
            }
        }
    }
    if start < text.len() {
        spans.extend(trimmed(text, start, text.len()));
    }
    spans
}
