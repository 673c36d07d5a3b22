//! Word-vector text files as embedding models.
//!
//! Reads the fastText / word2vec text format: an optional `"<count> <dims>"`
//! header line followed by one `word v1 v2 … vN` line per word, most
//! frequent words first. Only the first `max_words` entries are loaded so the
//! in-memory share of a large model stays bounded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::error::{HarvestError, Result};
use crate::language::LanguageTag;
use crate::normalize::normalize_term;
use crate::oracle::{EmbeddingOracle, ModelLoader, Neighbor};

/// An in-memory nearest-neighbour model loaded from a word-vector file.
///
/// Vectors are L2-normalized at load time, so cosine similarity is a dot
/// product. Words are keyed by their normalized form for the model's
/// language; when two words normalize to the same key the earlier (more
/// frequent) one wins.
#[derive(Debug)]
pub struct VectorFileOracle {
    dimensions: usize,
    words: Vec<String>,
    vectors: Vec<f32>,
    index: HashMap<String, usize>,
}

impl VectorFileOracle {
    /// Load a model from a file on disk.
    pub async fn open(
        path: impl AsRef<Path>,
        language: &LanguageTag,
        max_words: Option<usize>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let oracle = Self::from_reader(BufReader::new(file), language, max_words).await?;
        info!(
            path = %path.display(),
            language = %language,
            words = oracle.len(),
            dimensions = oracle.dimensions,
            "loaded word vectors"
        );
        Ok(oracle)
    }

    /// Parse a model from any buffered reader.
    ///
    /// Malformed lines (unparsable numbers, wrong dimensionality, zero
    /// vectors) are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ModelUnavailable`] if no usable vector is found.
    pub async fn from_reader<R>(
        reader: R,
        language: &LanguageTag,
        max_words: Option<usize>,
    ) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let limit = max_words.unwrap_or(usize::MAX);
        let mut lines = reader.lines();
        let mut dimensions: Option<usize> = None;
        let mut words = Vec::new();
        let mut vectors = Vec::new();
        let mut index = HashMap::new();
        let mut line_no = 0usize;

        while words.len() < limit {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            line_no += 1;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };

            let values: Vec<&str> = fields.collect();
            if line_no == 1 && values.len() == 1 {
                if let (Ok(_), Ok(dims)) = (word.parse::<usize>(), values[0].parse::<usize>()) {
                    dimensions = Some(dims);
                    continue;
                }
            }

            let parsed: std::result::Result<Vec<f32>, _> =
                values.iter().map(|v| v.parse::<f32>()).collect();
            let Ok(mut vector) = parsed else {
                warn!(line = line_no, "skipping word vector with unparsable values");
                continue;
            };
            if vector.is_empty() {
                warn!(line = line_no, "skipping word without vector values");
                continue;
            }
            let expected = *dimensions.get_or_insert(vector.len());
            if vector.len() != expected {
                warn!(line = line_no, expected, found = vector.len(), "skipping word vector");
                continue;
            }
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm == 0.0 || !norm.is_finite() {
                warn!(line = line_no, "skipping zero word vector");
                continue;
            }

            let key = normalize_term(word, language);
            if key.is_empty() || index.contains_key(&key) {
                continue;
            }
            for value in &mut vector {
                *value /= norm;
            }
            index.insert(key.clone(), words.len());
            words.push(key);
            vectors.extend(vector);
        }

        let dimensions = dimensions.unwrap_or(0);
        if words.is_empty() || dimensions == 0 {
            return Err(HarvestError::ModelUnavailable {
                language: language.to_string(),
                message: "word-vector input contains no usable vectors".to_string(),
            });
        }
        Ok(Self { dimensions, words, vectors, index })
    }

    /// Number of words loaded.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn vector(&self, idx: usize) -> &[f32] {
        &self.vectors[idx * self.dimensions..(idx + 1) * self.dimensions]
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl EmbeddingOracle for VectorFileOracle {
    async fn nearest(&self, term: &str, k: usize) -> Result<Vec<Neighbor>> {
        let &query_idx = self.index.get(term).ok_or_else(|| HarvestError::UnknownTerm {
            term: term.to_string(),
            language: String::new(),
        })?;
        let query = self.vector(query_idx);

        let mut scored: Vec<(f32, usize)> = (0..self.words.len())
            .filter(|&idx| idx != query_idx)
            .map(|idx| (dot(query, self.vector(idx)), idx))
            .collect();
        let order = |a: &(f32, usize), b: &(f32, usize)| {
            b.0.total_cmp(&a.0).then_with(|| self.words[a.1].cmp(&self.words[b.1]))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k, order);
            scored.truncate(k);
        }
        scored.sort_by(order);

        Ok(scored
            .into_iter()
            .map(|(similarity, idx)| Neighbor::new(self.words[idx].clone(), similarity))
            .collect())
    }
}

/// Loads `{dir}/{prefix}{language}{suffix}` word-vector files on demand.
///
/// The default naming follows the published fastText crawl vectors,
/// `cc.{language}.300.vec`.
#[derive(Debug, Clone)]
pub struct VectorFileLoader {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    max_words: Option<usize>,
}

impl VectorFileLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), prefix: "cc.".into(), suffix: ".300.vec".into(), max_words: None }
    }

    /// Set the file-name prefix and suffix around the language tag.
    pub fn with_file_pattern(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    /// Load at most `max_words` words per model.
    pub fn with_max_words(mut self, max_words: Option<usize>) -> Self {
        self.max_words = max_words;
        self
    }

    /// The file the loader reads for `language`.
    pub fn path_for(&self, language: &LanguageTag) -> PathBuf {
        self.dir.join(format!("{}{}{}", self.prefix, language, self.suffix))
    }
}

#[async_trait]
impl ModelLoader for VectorFileLoader {
    async fn load(&self, language: &LanguageTag) -> Result<Arc<dyn EmbeddingOracle>> {
        let path = self.path_for(language);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(HarvestError::ModelUnavailable {
                language: language.to_string(),
                message: format!("{} does not exist", path.display()),
            });
        }
        let oracle = VectorFileOracle::open(&path, language, self.max_words).await?;
        Ok(Arc::new(oracle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "5 3\n\
        river 1.0 0.0 0.0\n\
        stream 0.9 0.1 0.0\n\
        lake 0.6 0.8 0.0\n\
        broken 0.1 x 0.3\n\
        desert 0.0 0.0 1.0\n\
        short 1.0 0.0\n";

    fn en() -> LanguageTag {
        LanguageTag::new("en").unwrap()
    }

    #[tokio::test]
    async fn parses_header_and_skips_malformed_lines() {
        let oracle = VectorFileOracle::from_reader(SAMPLE.as_bytes(), &en(), None).await.unwrap();
        assert_eq!(oracle.dimensions(), 3);
        assert_eq!(oracle.len(), 4);
    }

    #[tokio::test]
    async fn nearest_orders_by_cosine_and_excludes_query() {
        let oracle = VectorFileOracle::from_reader(SAMPLE.as_bytes(), &en(), None).await.unwrap();
        let result = oracle.nearest("river", 2).await.unwrap();
        let terms: Vec<_> = result.iter().map(|n| n.term.as_str()).collect();
        assert_eq!(terms, vec!["stream", "lake"]);
        assert!(result[0].similarity > result[1].similarity);
        assert!((result[1].similarity - 0.6).abs() < 1e-5);
    }

    #[tokio::test]
    async fn max_words_bounds_the_vocabulary() {
        let oracle =
            VectorFileOracle::from_reader(SAMPLE.as_bytes(), &en(), Some(2)).await.unwrap();
        assert_eq!(oracle.len(), 2);
        assert!(matches!(
            oracle.nearest("lake", 1).await,
            Err(HarvestError::UnknownTerm { .. })
        ));
    }

    #[tokio::test]
    async fn headerless_input_uses_first_vector_dimensions() {
        let input = "Café 1.0 0.0\ncafe 0.0 1.0\ntea 0.7 0.7\n";
        let oracle = VectorFileOracle::from_reader(input.as_bytes(), &en(), None).await.unwrap();
        assert_eq!(oracle.dimensions(), 2);
        assert_eq!(oracle.len(), 2);
        assert_eq!(oracle.nearest("cafe", 5).await.unwrap()[0].term, "tea");
    }

    #[tokio::test]
    async fn loader_reports_missing_file_as_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = VectorFileLoader::new(dir.path());
        let err = loader.load(&en()).await.err().unwrap();
        assert!(matches!(err, HarvestError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn loader_reads_conventional_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let loader = VectorFileLoader::new(dir.path());
        tokio::fs::write(loader.path_for(&en()), SAMPLE).await.unwrap();
        let model = loader.load(&en()).await.unwrap();
        assert_eq!(model.nearest("river", 1).await.unwrap()[0].term, "stream");
    }
}
