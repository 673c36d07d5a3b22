use std::path::Path;

use clap::{CommandFactory, Parser};
use harvest_cli::{Cli, execute};
use harvest_core::{CancellationToken, CorpusRecord, ExpandedKeyword, HarvestError, RunError};
use harvest_telemetry::LogFormat;

const VECTORS: &str = "4 3\n\
    river 1.0 0.0 0.0\n\
    stream 0.9 0.1 0.0\n\
    lake 0.7 0.7 0.0\n\
    desert 0.0 0.0 1.0\n";

const DOCUMENTS: &str = concat!(
    "{\"id\":\"Rivers\",\"text\":\"The river rises[2].\\n\\nDeserts are dry.\\n\\nThe river rises.\"}\n",
    "{\"id\":\"Streams\",\"text\":\"A stream joins it.\"}\n",
);

fn run_file(models: &Path) -> String {
    format!(
        r#"
language = "en"
seeds = ["river"]
depth = 1
breadth = 2
min_similarity = 0.5
threshold = 0.3
granularity = "paragraph"
clean_wiki_markup = true

[models]
dir = "{}"

[pipeline]
workers = 2
queue_capacity = 4
"#,
        models.display()
    )
}

async fn setup(dir: &Path) -> Cli {
    let models = dir.join("models");
    tokio::fs::create_dir_all(&models).await.unwrap();
    tokio::fs::write(models.join("cc.en.300.vec"), VECTORS).await.unwrap();
    tokio::fs::write(dir.join("docs.jsonl"), DOCUMENTS).await.unwrap();
    tokio::fs::write(dir.join("run.toml"), run_file(&models)).await.unwrap();

    Cli {
        config: dir.join("run.toml"),
        input: dir.join("docs.jsonl"),
        output: dir.join("out/corpus.jsonl"),
        vocabulary_out: Some(dir.join("vocabulary.jsonl")),
        log_format: LogFormat::Pretty,
    }
}

#[tokio::test]
async fn harvests_matching_paragraphs_into_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let cli = setup(dir.path()).await;

    let report = execute(&cli, CancellationToken::new()).await.unwrap();
    assert_eq!(report.vocabulary_size, 3);
    assert_eq!(report.summary.fetched, 4);
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.rejected_low_score, 1);
    assert_eq!(report.summary.rejected_duplicate, 1);

    let corpus = tokio::fs::read_to_string(&cli.output).await.unwrap();
    let records: Vec<CorpusRecord> = corpus.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records[0].text, "The river rises.");
    assert_eq!(records[1].locator.document_id, "Streams");
    assert_eq!(records[1].matched_terms, vec!["stream"]);

    let vocabulary = tokio::fs::read_to_string(dir.path().join("vocabulary.jsonl")).await.unwrap();
    let terms: Vec<String> = vocabulary
        .lines()
        .map(|l| serde_json::from_str::<ExpandedKeyword>(l).unwrap().term)
        .collect();
    assert_eq!(terms, vec!["lake", "river", "stream"]);
}

#[tokio::test]
async fn missing_model_fails_before_retrieval() {
    let dir = tempfile::tempdir().unwrap();
    let cli = setup(dir.path()).await;
    tokio::fs::remove_file(dir.path().join("models/cc.en.300.vec")).await.unwrap();

    let err = execute(&cli, CancellationToken::new()).await.unwrap_err();
    let cause = err.downcast_ref::<HarvestError>().unwrap();
    assert!(matches!(cause, HarvestError::ModelUnavailable { .. }), "{err:#}");
    assert!(!cli.output.exists());
}

#[tokio::test]
async fn cancelled_run_reports_its_summary() {
    let dir = tempfile::tempdir().unwrap();
    let cli = setup(dir.path()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = execute(&cli, cancel).await.unwrap_err();
    let run = err.downcast_ref::<RunError>().unwrap();
    assert!(matches!(run.error, HarvestError::Cancelled));
    assert!(run.summary.is_reconciled());
}

#[test]
fn command_line_parses_with_defaults() {
    Cli::command().debug_assert();

    let cli = Cli::try_parse_from(["harvest", "-c", "run.toml", "-i", "docs.jsonl", "-o", "corpus.jsonl"])
        .unwrap();
    assert_eq!(cli.config, Path::new("run.toml"));
    assert_eq!(cli.log_format, LogFormat::Pretty);
    assert!(cli.vocabulary_out.is_none());

    let cli = Cli::try_parse_from([
        "harvest",
        "--config",
        "run.toml",
        "--input",
        "docs.jsonl",
        "--output",
        "corpus.jsonl",
        "--vocabulary-out",
        "vocabulary.jsonl",
        "--log-format",
        "json",
    ])
    .unwrap();
    assert_eq!(cli.log_format, LogFormat::Json);
    assert_eq!(cli.vocabulary_out.as_deref(), Some(Path::new("vocabulary.jsonl")));
}
