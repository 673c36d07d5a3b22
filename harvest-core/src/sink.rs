//! Append-only persistence of accepted corpus records.
//!
//! A [`CorpusSink`] receives records in source order and must persist each
//! one whole or report [`HarvestError::SinkWrite`]. The pipeline treats a
//! sink failure as fatal for the run.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::document::CorpusRecord;
use crate::error::{HarvestError, Result};

/// An append-only store of corpus records.
///
/// # Example
///
/// ```rust,ignore
/// use harvest_core::{CorpusSink, JsonlCorpusSink};
///
/// let sink = JsonlCorpusSink::open("corpus/rivers.jsonl").await?;
/// sink.append(&record).await?;
/// ```
#[async_trait]
pub trait CorpusSink: Send + Sync {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::SinkWrite`] if the record could not be stored.
    async fn append(&self, record: &CorpusRecord) -> Result<()>;

    /// Make appended records durable. The default does nothing.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A sink that keeps records in memory, for tests and small runs.
#[derive(Debug, Default)]
pub struct InMemoryCorpusSink {
    records: RwLock<Vec<CorpusRecord>>,
}

impl InMemoryCorpusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the records appended so far.
    pub async fn records(&self) -> Vec<CorpusRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CorpusSink for InMemoryCorpusSink {
    async fn append(&self, record: &CorpusRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

/// A sink writing one JSON object per line.
///
/// Each record is serialized completely before a single write, and writes
/// are serialized through a mutex, so concurrent callers never interleave
/// partial lines. A failed write is truncated away before the error is
/// returned.
#[derive(Debug)]
pub struct JsonlCorpusSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlCorpusSink {
    /// Open (or create) `path` for appending, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::SinkWrite`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| sink_error(&path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| sink_error(&path, e))?;
        info!(path = %path.display(), "opened corpus sink");
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sink_error(path: &Path, e: impl std::fmt::Display) -> HarvestError {
    error!(path = %path.display(), error = %e, "corpus sink failure");
    HarvestError::SinkWrite { sink: format!("jsonl:{}", path.display()), message: e.to_string() }
}

/// An append target that can be cut back to an earlier length.
#[async_trait]
trait AppendTarget: AsyncWrite + Unpin + Send {
    async fn end(&mut self) -> io::Result<u64>;

    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl AppendTarget for File {
    async fn end(&mut self) -> io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

/// Append `line` whole, or leave the target as it was.
async fn append_line<T: AppendTarget>(target: &mut T, line: &[u8]) -> io::Result<()> {
    let end = target.end().await?;
    let written = async {
        target.write_all(line).await?;
        target.flush().await
    }
    .await;
    if let Err(e) = written {
        if let Err(rollback) = target.truncate(end).await {
            warn!(error = %rollback, length = end, "failed to truncate partial record");
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl CorpusSink for JsonlCorpusSink {
    async fn append(&self, record: &CorpusRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(|e| sink_error(&self.path, e))?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        append_line(&mut *file, &line).await.map_err(|e| sink_error(&self.path, e))
    }

    async fn flush(&self) -> Result<()> {
        let file = self.file.lock().await;
        file.sync_data().await.map_err(|e| sink_error(&self.path, e))
    }
}
