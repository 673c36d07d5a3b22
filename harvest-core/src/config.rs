//! Configuration for keyword expansion and the retrieval pipeline.
//!
//! The domain parameters (expansion depth, breadth, minimum similarity and
//! acceptance threshold) have no defaults and must be set explicitly. Only
//! execution tunables such as worker count and queue capacity default.

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Default bounded queue capacity between pipeline stages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default number of scorer workers in the concurrent pipeline.
pub const DEFAULT_WORKERS: usize = 4;
/// Default number of fetched units between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Parameters of the breadth-first keyword expansion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExpansionConfig {
    /// Number of generations to expand past the seeds (0 returns the seeds).
    pub depth: u32,
    /// Neighbours requested per expanded term.
    pub breadth: usize,
    /// Minimum similarity for a neighbour to be accepted.
    pub min_similarity: f32,
}

impl ExpansionConfig {
    /// Create a new builder for constructing an [`ExpansionConfig`].
    pub fn builder() -> ExpansionConfigBuilder {
        ExpansionConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if `breadth == 0` or
    /// `min_similarity` is outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.breadth == 0 {
            return Err(HarvestError::ConfigError("breadth must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(HarvestError::ConfigError(format!(
                "min_similarity ({}) must be within [0, 1]",
                self.min_similarity
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`ExpansionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExpansionConfigBuilder {
    depth: Option<u32>,
    breadth: Option<usize>,
    min_similarity: Option<f32>,
}

impl ExpansionConfigBuilder {
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn breadth(mut self, breadth: usize) -> Self {
        self.breadth = Some(breadth);
        self
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    /// Build the [`ExpansionConfig`], validating that every parameter is set.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if a parameter is missing or
    /// [`ExpansionConfig::validate`] fails.
    pub fn build(self) -> Result<ExpansionConfig> {
        let config = ExpansionConfig {
            depth: self.depth.ok_or_else(|| missing("depth"))?,
            breadth: self.breadth.ok_or_else(|| missing("breadth"))?,
            min_similarity: self.min_similarity.ok_or_else(|| missing("min_similarity"))?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parameters of one retrieval run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PipelineOptions {
    /// Minimum relevance score for a unit to be accepted.
    pub threshold: f32,
    /// Scorer workers used by the concurrent pipeline.
    pub workers: usize,
    /// Capacity of each bounded queue between stages.
    pub queue_capacity: usize,
    /// Fetched units between progress log lines.
    pub progress_interval: u64,
}

impl PipelineOptions {
    /// Create a new builder for constructing [`PipelineOptions`].
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }

    /// Check that the options are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the threshold is negative or
    /// not finite, or if `workers`, `queue_capacity` or `progress_interval`
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(HarvestError::ConfigError(format!(
                "threshold ({}) must be a finite, non-negative number",
                self.threshold
            )));
        }
        if self.workers == 0 {
            return Err(HarvestError::ConfigError("workers must be greater than zero".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(HarvestError::ConfigError(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(HarvestError::ConfigError(
                "progress_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing validated [`PipelineOptions`].
#[derive(Debug, Clone)]
pub struct PipelineOptionsBuilder {
    threshold: Option<f32>,
    workers: usize,
    queue_capacity: usize,
    progress_interval: u64,
}

impl Default for PipelineOptionsBuilder {
    fn default() -> Self {
        Self {
            threshold: None,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PipelineOptionsBuilder {
    /// Set the acceptance threshold.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set the number of scorer workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the capacity of the bounded stage queues.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Build the [`PipelineOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigError`] if the threshold is missing or
    /// [`PipelineOptions::validate`] fails.
    pub fn build(self) -> Result<PipelineOptions> {
        let options = PipelineOptions {
            threshold: self.threshold.ok_or_else(|| missing("threshold"))?,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            progress_interval: self.progress_interval,
        };
        options.validate()?;
        Ok(options)
    }
}

fn missing(field: &str) -> HarvestError {
    HarvestError::ConfigError(format!("{field} is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_requires_every_parameter() {
        let err = ExpansionConfig::builder().depth(1).breadth(2).build().unwrap_err();
        assert!(err.to_string().contains("min_similarity is required"));
    }

    #[test]
    fn expansion_rejects_out_of_range_values() {
        assert!(
            ExpansionConfig::builder().depth(1).breadth(0).min_similarity(0.5).build().is_err()
        );
        assert!(
            ExpansionConfig::builder().depth(1).breadth(2).min_similarity(1.5).build().is_err()
        );
        let config =
            ExpansionConfig::builder().depth(0).breadth(1).min_similarity(0.0).build().unwrap();
        assert_eq!(config.depth, 0);
    }

    #[test]
    fn pipeline_options_default_tunables() {
        let options = PipelineOptions::builder().threshold(0.3).build().unwrap();
        assert_eq!(options.workers, DEFAULT_WORKERS);
        assert_eq!(options.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn pipeline_options_reject_bad_values() {
        assert!(PipelineOptions::builder().build().is_err());
        assert!(PipelineOptions::builder().threshold(f32::NAN).build().is_err());
        assert!(PipelineOptions::builder().threshold(-0.1).build().is_err());
        assert!(PipelineOptions::builder().threshold(0.1).workers(0).build().is_err());
        assert!(PipelineOptions::builder().threshold(0.1).queue_capacity(0).build().is_err());
    }
}
