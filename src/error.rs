//! Error taxonomy for the experiment pipeline
//!
//! Per-metric failures (`InsufficientGroups`, `UnsupportedTestCondition`) are
//! recoverable: the aggregator turns them into degraded report entries. The
//! remaining variants surface to the caller.

use thiserror::Error;

/// Errors produced by the statistical pipeline and its export hooks
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("insufficient groups for '{metric}': need at least 2 models, got {groups}")]
    InsufficientGroups { metric: String, groups: usize },

    #[error("unsupported test condition for '{metric}': {reason}")]
    UnsupportedTestCondition { metric: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error("pipeline has not been run yet")]
    NotRun,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ExperimentError>;

impl ExperimentError {
    /// True for failures scoped to a single metric
    pub fn is_metric_scoped(&self) -> bool {
        matches!(
            self,
            Self::InsufficientGroups { .. } | Self::UnsupportedTestCondition { .. }
        )
    }
}
