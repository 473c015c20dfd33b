// Per-metric AB pipeline
//
// 1. Select the omnibus family (pluggable policy, assumption checks recorded)
// 2. Run ANOVA or Kruskal-Wallis across all models
// 3. If significant and more than two models: Mann-Whitney U for every pair
//
// Every executed step is appended to the pipeline track, in execution order.

use super::selection::{OmnibusFamily, TestSelectionPolicy};
use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::stats::{
    kruskal_wallis, mann_whitney_u, one_way_anova, NormalityTestResult, OmnibusTestResult,
    PairwiseTestResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A step of the AB pipeline that actually ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    CheckNormality,
    CheckHomoscedasticity,
    PerformAnova,
    PerformKruskalwallis,
    PerformMannwhitney,
}

/// Tests executed for one metric
///
/// At most one of `anova` and `kruskalwallis` is set. `mannwhitney` is set
/// only when that omnibus test is significant and there are more than two
/// models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbTestsBundle {
    pub pipeline_track: Vec<PipelineStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shapiro: Option<Vec<NormalityTestResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levene: Option<OmnibusTestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anova: Option<OmnibusTestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kruskalwallis: Option<OmnibusTestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mannwhitney: Option<Vec<PairwiseTestResult>>,
}

impl AbTestsBundle {
    /// True if the given step ran
    pub fn ran(&self, step: PipelineStep) -> bool {
        self.pipeline_track.contains(&step)
    }

    /// The omnibus test that ran, if any
    pub fn omnibus(&self) -> Option<&OmnibusTestResult> {
        self.anova.as_ref().or(self.kruskalwallis.as_ref())
    }
}

/// Runs the test sequence for one metric
pub struct AbPipeline {
    significance_level: f64,
    normality_level: f64,
    policy: Box<dyn TestSelectionPolicy>,
}

impl std::fmt::Debug for AbPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbPipeline")
            .field("significance_level", &self.significance_level)
            .field("normality_level", &self.normality_level)
            .finish_non_exhaustive()
    }
}

impl AbPipeline {
    pub fn new(config: &ExperimentConfig) -> Self {
        Self {
            significance_level: config.significance_level,
            normality_level: config.normality_level,
            policy: config.policy.policy(),
        }
    }

    /// Replace the selection policy with a custom one
    pub fn with_policy(mut self, policy: Box<dyn TestSelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Run the pipeline over one sample per model, in model-index order
    ///
    /// # Errors
    ///
    /// - `InsufficientGroups` with fewer than two samples
    /// - `UnsupportedTestCondition` when a sample is empty, holds a non-finite
    ///   value, or the selected test cannot be computed on the data
    pub fn run(&self, metric: &str, samples: &[Vec<f64>]) -> Result<AbTestsBundle> {
        if samples.len() < 2 {
            return Err(ExperimentError::InsufficientGroups {
                metric: metric.to_string(),
                groups: samples.len(),
            });
        }
        check_samples(metric, samples)?;

        let groups: Vec<&[f64]> = samples.iter().map(|s| s.as_slice()).collect();
        let unsupported = |e: ExperimentError| match e {
            ExperimentError::Statistics(reason) => ExperimentError::UnsupportedTestCondition {
                metric: metric.to_string(),
                reason,
            },
            other => other,
        };

        let selection = self
            .policy
            .select(&groups, self.normality_level)
            .map_err(unsupported)?;

        let mut bundle = AbTestsBundle::default();
        if selection.shapiro.is_some() {
            bundle.pipeline_track.push(PipelineStep::CheckNormality);
        }
        if selection.levene.is_some() {
            bundle.pipeline_track.push(PipelineStep::CheckHomoscedasticity);
        }
        bundle.shapiro = selection.shapiro;
        bundle.levene = selection.levene;

        let omnibus = match selection.family {
            OmnibusFamily::Anova => {
                let test = one_way_anova(&groups).map_err(unsupported)?;
                let result = OmnibusTestResult::new(test, self.significance_level);
                bundle.pipeline_track.push(PipelineStep::PerformAnova);
                bundle.anova = Some(result.clone());
                result
            }
            OmnibusFamily::KruskalWallis => {
                let test = kruskal_wallis(&groups).map_err(unsupported)?;
                let result = OmnibusTestResult::new(test, self.significance_level);
                bundle.pipeline_track.push(PipelineStep::PerformKruskalwallis);
                bundle.kruskalwallis = Some(result.clone());
                result
            }
        };
        debug!(
            family = ?selection.family,
            statistic = omnibus.statistic,
            p_value = omnibus.p_value,
            significant = omnibus.is_significant,
            "omnibus test"
        );

        if omnibus.is_significant && samples.len() > 2 {
            bundle.pipeline_track.push(PipelineStep::PerformMannwhitney);
            bundle.mannwhitney = Some(self.pairwise(&groups).map_err(unsupported)?);
        }

        Ok(bundle)
    }

    fn pairwise(&self, groups: &[&[f64]]) -> Result<Vec<PairwiseTestResult>> {
        let mut results = Vec::with_capacity(groups.len() * (groups.len() - 1) / 2);
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                let test = mann_whitney_u(groups[i], groups[j])?;
                let result = PairwiseTestResult::new(i, j, test, self.significance_level);
                debug!(
                    model_index_1 = i,
                    model_index_2 = j,
                    p_value = result.p_value,
                    significant = result.is_significant,
                    "Mann-Whitney U"
                );
                results.push(result);
            }
        }
        Ok(results)
    }
}

fn check_samples(metric: &str, samples: &[Vec<f64>]) -> Result<()> {
    for (idx, sample) in samples.iter().enumerate() {
        let reason = if sample.is_empty() {
            format!("sample of model {} is empty", idx)
        } else if sample.iter().any(|v| !v.is_finite()) {
            format!("sample of model {} holds a non-finite value", idx)
        } else {
            continue;
        };
        return Err(ExperimentError::UnsupportedTestCondition {
            metric: metric.to_string(),
            reason,
        });
    }
    Ok(())
}
