//! Experiment input: per-metric score samples and model descriptions

use crate::error::{ExperimentError, Result};
use crate::model::{ModelProvider, ModelRecord, ModelSpec, StaticModelProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Samples of all models under one metric, in model-index order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSamples {
    pub metric: String,
    pub samples: Vec<Vec<f64>>,
}

/// Ordered mapping from metric name to samples
///
/// Iteration follows insertion order; metric names are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable {
    entries: Vec<MetricSamples>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric; a name already present is rejected
    pub fn insert(&mut self, metric: &str, samples: Vec<Vec<f64>>) -> Result<()> {
        if metric.trim().is_empty() {
            return Err(ExperimentError::InvalidInput(
                "metric name must not be empty".to_string(),
            ));
        }
        if self.get(metric).is_some() {
            return Err(ExperimentError::InvalidInput(format!(
                "duplicate metric '{}'",
                metric
            )));
        }
        self.entries.push(MetricSamples {
            metric: metric.to_string(),
            samples,
        });
        Ok(())
    }

    pub fn get(&self, metric: &str) -> Option<&MetricSamples> {
        self.entries.iter().find(|e| e.metric == metric)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricSamples> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest number of models seen under any metric
    pub fn model_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.samples.len())
            .max()
            .unwrap_or(0)
    }
}

impl TryFrom<Vec<MetricSamples>> for ScoreTable {
    type Error = ExperimentError;

    fn try_from(entries: Vec<MetricSamples>) -> Result<Self> {
        let mut table = Self::new();
        for entry in entries {
            table.insert(&entry.metric, entry.samples)?;
        }
        Ok(table)
    }
}

impl<'a> IntoIterator for &'a ScoreTable {
    type Item = &'a MetricSamples;
    type IntoIter = std::slice::Iter<'a, MetricSamples>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Experiment input document
///
/// ```json
/// {
///   "models": [{"name": "logreg", "technology": "sklearn", "kind": "classifier"}],
///   "scores": [{"metric": "accuracy", "samples": [[0.8, 0.82], [0.9, 0.91]]}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInput {
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    pub scores: Vec<MetricSamples>,
}

impl ExperimentInput {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let input: Self = serde_json::from_str(content)?;
        if input.scores.is_empty() {
            return Err(ExperimentError::InvalidInput(
                "input holds no metrics".to_string(),
            ));
        }
        Ok(input)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Split into the score table and the model records
    pub fn into_parts(self) -> Result<(ScoreTable, Vec<ModelRecord>)> {
        let models = StaticModelProvider::from_specs(&self.models).load()?;
        let scores = ScoreTable::try_from(self.scores)?;
        Ok((scores, models))
    }
}
