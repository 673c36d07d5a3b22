//! The `harvest` command: expand seed keywords, then stream a JSON-lines
//! document file through the retrieval pipeline into a corpus file.

pub mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use harvest_core::{
    CancellationToken, ExpandedVocabulary, HarvestReport, JsonlCorpusSink, JsonlDocumentSource,
    units_from_documents,
};
use harvest_telemetry::LogFormat;
use tokio::io::AsyncWriteExt;
use tracing::{Instrument, info, info_span};

pub use config::RunFileConfig;

#[derive(Parser, Debug)]
#[command(name = "harvest", version, about = "Harvest a topical corpus from seed keywords")]
pub struct Cli {
    /// TOML run configuration
    #[arg(long, short)]
    pub config: PathBuf,

    /// JSON-lines documents, one `{"id", "text", "language"?}` object per line
    #[arg(long, short)]
    pub input: PathBuf,

    /// JSON-lines corpus file; records are appended
    #[arg(long, short)]
    pub output: PathBuf,

    /// Also write the expanded vocabulary as JSON lines
    #[arg(long)]
    pub vocabulary_out: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Run one harvest as described by `cli`.
///
/// A failed or cancelled retrieval surfaces as a [`harvest_core::RunError`]
/// inside the returned error, so callers can still report its summary.
pub async fn execute(cli: &Cli, cancel: CancellationToken) -> Result<HarvestReport> {
    let config = RunFileConfig::load(&cli.config).await?;
    let job = config.job().context("invalid run configuration")?;
    let span = info_span!("harvest.run", language = %config.language);

    async move {
        let seeds = job.seeds(&config.seeds, &config.seed_texts)?;
        let vocabulary = job.expand(&seeds).await.context("keyword expansion failed")?;
        if let Some(path) = &cli.vocabulary_out {
            write_vocabulary(path, &vocabulary).await?;
        }

        let documents = JsonlDocumentSource::open(&cli.input).await?;
        let units = units_from_documents(documents, config.split_options());
        let sink = Arc::new(JsonlCorpusSink::open(&cli.output).await?);
        let report = job.retrieve(Arc::new(vocabulary), units, sink, &cancel).await?;
        info!(
            vocabulary_size = report.vocabulary_size,
            accepted = report.summary.accepted,
            output = %cli.output.display(),
            "harvest finished"
        );
        Ok::<_, anyhow::Error>(report)
    }
    .instrument(span)
    .await
}

async fn write_vocabulary(path: &std::path::Path, vocabulary: &ExpandedVocabulary) -> Result<()> {
    let mut out = Vec::new();
    for keyword in vocabulary.iter() {
        serde_json::to_writer(&mut out, keyword)?;
        out.push(b'\n');
    }
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(&out).await?;
    file.flush().await?;
    info!(path = %path.display(), terms = vocabulary.len(), "wrote vocabulary");
    Ok(())
}
