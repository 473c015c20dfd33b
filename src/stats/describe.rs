// Descriptive statistics for per-model score samples
//
// - Everything is computed in f64; the median ranks models, so it must not
//   lose precision
// - Quantiles come from statrs' OrderStatistics (R-8 estimator; the median is
//   the usual middle value or mean of the two middle values)

use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Max, Min, OrderStatistics, Statistics};

/// Descriptive statistics of one model's score sample under one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDescribed {
    /// Position of the model in the input
    pub model_index: usize,
    /// Display name of the model
    pub model_name: String,
    /// Number of observations
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation (divides by n)
    pub std: f64,
    pub min: f64,
    /// 25th percentile
    pub q1: f64,
    /// Ranking criterion once significance is established
    pub median: f64,
    /// 75th percentile
    pub q3: f64,
    pub max: f64,
}

impl ScoreDescribed {
    /// Describe a raw score sample
    ///
    /// # Example
    /// ```ignore
    /// use ab_verdict::stats::ScoreDescribed;
    ///
    /// let described = ScoreDescribed::from_sample(0, "logreg", &[0.8, 0.9, 0.85]).unwrap();
    /// assert_eq!(described.median, 0.85);
    /// ```
    pub fn from_sample(model_index: usize, model_name: &str, sample: &[f64]) -> Result<Self> {
        let mut data = sample_data(sample, model_index)?;

        Ok(Self {
            model_index,
            model_name: model_name.to_string(),
            count: sample.len(),
            mean: Statistics::mean(sample),
            std: Statistics::population_std_dev(sample),
            min: Min::min(&data),
            q1: data.lower_quartile(),
            median: data.median(),
            q3: data.upper_quartile(),
            max: Max::max(&data),
        })
    }
}

/// Median of a sample
///
/// Median is robust to outlier folds, which is why it ranks models.
pub fn median(sample: &[f64]) -> Result<f64> {
    Ok(sample_data(sample, 0)?.median())
}

fn sample_data(sample: &[f64], model_index: usize) -> Result<Data<Vec<f64>>> {
    if sample.is_empty() {
        return Err(ExperimentError::Statistics(format!(
            "cannot describe empty sample for model {}",
            model_index
        )));
    }
    Ok(Data::new(sample.to_vec()))
}
