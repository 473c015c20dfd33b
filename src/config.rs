// Configuration for the experiment pipeline
//
// One significance level drives the omnibus and pairwise tests; a second one
// drives the assumption checks that pick between ANOVA and Kruskal-Wallis.

use crate::error::{ExperimentError, Result};
use crate::pipeline::SelectionPolicyKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one experiment run
///
/// # Example
/// ```
/// use ab_verdict::config::ExperimentConfig;
///
/// let config = ExperimentConfig::default();
/// assert_eq!(config.significance_level, 0.05); // 95% confidence
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Significance level (alpha) for the omnibus and pairwise tests
    ///
    /// - 0.05 (default): 95% confidence
    /// - 0.01: 99% confidence, fewer false positives
    /// - 0.10: 90% confidence, more sensitive
    pub significance_level: f64,

    /// Significance level for the normality and variance-homogeneity checks
    ///
    /// A sample is treated as normal when its Shapiro-Wilk p-value is at or
    /// above this level. Same rule for Levene's test.
    pub normality_level: f64,

    /// Which omnibus test family to run
    pub policy: SelectionPolicyKind,

    /// Run one worker per metric instead of processing metrics in sequence
    pub parallel: bool,

    /// Base name for the rendered report files
    pub report_name: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            normality_level: 0.05,
            policy: SelectionPolicyKind::AssumptionChecked,
            parallel: false,
            report_name: "general_report".to_string(),
        }
    }
}

impl ExperimentConfig {
    /// Strict configuration (99% confidence)
    pub fn strict() -> Self {
        Self {
            significance_level: 0.01,
            ..Self::default()
        }
    }

    /// Permissive configuration (90% confidence)
    pub fn permissive() -> Self {
        Self {
            significance_level: 0.10,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file; missing keys keep their defaults
    ///
    /// ```toml
    /// significance_level = 0.01
    /// policy = "nonparametric"
    /// parallel = true
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }

        if !(self.normality_level > 0.0 && self.normality_level < 1.0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "normality_level must be in (0, 1), got {}",
                self.normality_level
            )));
        }

        if self.report_name.trim().is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "report_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
