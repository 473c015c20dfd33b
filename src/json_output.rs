//! JSON output format for experiment reports
//!
//! `--format json` prints this envelope: format metadata, the model table, a
//! short summary and the full report.

use crate::model::ModelRecord;
use crate::report::GeneralReport;
use serde::{Deserialize, Serialize};

/// Counts over the metrics of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSummary {
    /// Metrics processed
    pub metrics: usize,
    /// Metrics whose tests could not run
    pub degraded: usize,
    /// Metrics with a best model
    pub decided: usize,
}

/// Complete JSON document for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Crate version that produced the document
    pub version: String,
    /// Format name
    pub format: String,
    /// Models known to the run, in index order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub models: Vec<ModelRecord>,
    pub summary: JsonSummary,
    pub report: GeneralReport,
}

impl JsonOutput {
    pub fn new(report: &GeneralReport, models: &[ModelRecord]) -> Self {
        let entries = report.reports_by_score();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "ab-verdict-json-v1".to_string(),
            models: models.to_vec(),
            summary: JsonSummary {
                metrics: entries.len(),
                degraded: entries.iter().filter(|e| e.is_degraded()).count(),
                decided: entries
                    .iter()
                    .filter(|e| e.best_model_index.is_some())
                    .count(),
            },
            report: report.clone(),
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
