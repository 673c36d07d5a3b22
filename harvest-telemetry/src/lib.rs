//! Logging setup for harvest binaries and an in-memory event capture layer
//! for tests.
//!
//! ```rust,ignore
//! harvest_telemetry::init_telemetry(LogFormat::Json)?;
//! tracing::info!(accepted = 12, "retrieval run complete");
//! ```

pub mod capture;

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use capture::{CapturedEvent, CapturedEvents, EventCaptureLayer};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown log format '{0}' (expected 'pretty' or 'json')")]
    UnknownFormat(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for command output.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_telemetry(format: LogFormat) -> Result<(), TelemetryError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    let result = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))
}

/// Install the global subscriber together with an [`EventCaptureLayer`]
/// writing into `storage`.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_with_capture(format: LogFormat, storage: CapturedEvents) -> Result<(), TelemetryError> {
    let registry =
        tracing_subscriber::registry().with(env_filter()).with(EventCaptureLayer::new(storage));
    let result = match format {
        LogFormat::Pretty => {
            registry.with(fmt::layer().with_writer(std::io::stderr).with_target(false)).try_init()
        }
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_formats() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!("xml".parse::<LogFormat>(), Err(TelemetryError::UnknownFormat(_))));
    }

    #[tokio::test]
    async fn global_capture_sees_events_and_second_init_fails() {
        let storage = CapturedEvents::new();
        init_with_capture(LogFormat::Pretty, storage.clone()).unwrap();
        tracing::info!(fetched = 2u64, "retrieval run complete");

        let events = storage.with_message("retrieval run complete");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field_u64("fetched"), Some(2));

        assert!(matches!(init_telemetry(LogFormat::Json), Err(TelemetryError::Init(_))));
    }
}
