use std::process::ExitCode;

use clap::Parser;
use harvest_cli::{Cli, execute};
use harvest_core::{CancellationToken, HarvestError, RunError, RunSummary};
use tracing::{error, warn};

fn print_summary(summary: &RunSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "failed to serialize run summary"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = harvest_telemetry::init_telemetry(cli.log_format) {
        eprintln!("harvest: {e}");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current unit");
            on_signal.cancel();
        }
    });

    match execute(&cli, cancel).await {
        Ok(report) => {
            print_summary(&report.summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "harvest failed");
            match e.downcast_ref::<RunError>() {
                Some(run) => {
                    print_summary(&run.summary);
                    if matches!(run.error, HarvestError::Cancelled) {
                        ExitCode::from(130)
                    } else {
                        ExitCode::FAILURE
                    }
                }
                None => {
                    eprintln!("harvest: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
