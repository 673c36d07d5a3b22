//! Lazy sources of documents and text units.
//!
//! The pipeline consumes a [`UnitStream`]: any `Stream` of
//! `Result<TextUnit>`. Nothing here assumes random access or a known length;
//! documents are read, cleaned and split one at a time.

use std::path::Path;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::chunking::{UnitGranularity, UnitSplitter};
use crate::document::{Document, TextUnit};
use crate::error::{HarvestError, Result};
use crate::normalize::clean_wiki_text;

/// A lazy, possibly unbounded sequence of text units.
pub type UnitStream = BoxStream<'static, Result<TextUnit>>;

/// A lazy, possibly unbounded sequence of documents.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Wrap an in-memory list of units as a [`UnitStream`].
pub fn units_from_iter<I>(units: I) -> UnitStream
where
    I: IntoIterator<Item = TextUnit>,
    I::IntoIter: Send + 'static,
{
    stream::iter(units.into_iter().map(Ok)).boxed()
}

/// Options for turning documents into units.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitOptions {
    pub granularity: UnitGranularity,
    /// Strip wiki citation markers and escapes before splitting.
    /// Unit offsets then refer to the cleaned text.
    pub clean_wiki_markup: bool,
}

/// Split each document of `documents` into units, lazily.
///
/// A document error is passed through as a unit error at the position the
/// document would have occupied.
pub fn units_from_documents(documents: DocumentStream, options: SplitOptions) -> UnitStream {
    let splitter = UnitSplitter::new(options.granularity);
    documents
        .flat_map(move |document| match document {
            Ok(mut document) => {
                if options.clean_wiki_markup {
                    document.text = clean_wiki_text(&document.text);
                }
                let units = splitter.split(&document);
                debug!(document.id = %document.id, unit_count = units.len(), "split document");
                stream::iter(units.into_iter().map(Ok::<_, HarvestError>).collect::<Vec<_>>()).boxed()
            }
            Err(e) => stream::iter(vec![Err(e)]).boxed(),
        })
        .boxed()
}

/// Reads documents from a JSON-lines file, one [`Document`] per line.
///
/// Blank lines are skipped. A malformed line ends the stream with a
/// [`HarvestError::SourceRead`] naming the line number.
pub struct JsonlDocumentSource;

impl JsonlDocumentSource {
    /// Open `path` and return a lazy document stream.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::SourceRead`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<DocumentStream> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            HarvestError::SourceRead(format!("cannot open {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "opened document source");
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Stream documents from any buffered reader.
    pub fn from_reader<R>(reader: R) -> DocumentStream
    where
        R: tokio::io::AsyncBufRead + Unpin + Send + 'static,
    {
        let state = (reader.lines(), 0usize, false);
        stream::unfold(state, |(mut lines, mut line_no, done)| async move {
            if done {
                return None;
            }
            loop {
                line_no += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let item = serde_json::from_str::<Document>(&line).map_err(|e| {
                            HarvestError::SourceRead(format!("line {line_no}: {e}"))
                        });
                        let done = item.is_err();
                        return Some((item, (lines, line_no, done)));
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        let err = HarvestError::SourceRead(format!("line {line_no}: {e}"));
                        return Some((Err(err), (lines, line_no, true)));
                    }
                }
            }
        })
        .boxed()
    }
}
