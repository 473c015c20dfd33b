//! Report structures produced by an experiment run
//!
//! One [`GeneralReportByScore`] per metric, accumulated by a [`ReportBuilder`]
//! and sealed into a read-only [`GeneralReport`].

use crate::error::ExperimentError;
use crate::pipeline::{AbTestsBundle, Decision, PipelineStep};
use crate::stats::ScoreDescribed;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Why a metric could not be tested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFailure {
    /// `insufficient_groups`, `unsupported_test_condition` or `error`
    pub kind: String,
    pub reason: String,
}

impl MetricFailure {
    pub fn from_error(err: &ExperimentError) -> Self {
        match err {
            ExperimentError::InsufficientGroups { groups, .. } => Self {
                kind: "insufficient_groups".to_string(),
                reason: format!("need at least 2 models, got {}", groups),
            },
            ExperimentError::UnsupportedTestCondition { reason, .. } => Self {
                kind: "unsupported_test_condition".to_string(),
                reason: reason.clone(),
            },
            other => Self {
                kind: "error".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Everything computed for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralReportByScore {
    pub score_target: String,
    pub score_described: Vec<ScoreDescribed>,
    pub ab_tests: AbTestsBundle,
    pub best_model_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<MetricFailure>,
}

impl GeneralReportByScore {
    pub fn new(
        score_target: &str,
        score_described: Vec<ScoreDescribed>,
        ab_tests: AbTestsBundle,
    ) -> Self {
        Self {
            score_target: score_target.to_string(),
            score_described,
            ab_tests,
            best_model_index: None,
            failure: None,
        }
    }

    /// Entry for a metric whose tests could not run; the track stays empty
    pub fn degraded(
        score_target: &str,
        score_described: Vec<ScoreDescribed>,
        failure: MetricFailure,
    ) -> Self {
        Self {
            score_target: score_target.to_string(),
            score_described,
            ab_tests: AbTestsBundle::default(),
            best_model_index: None,
            failure: Some(failure),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Aggregated verdicts of one run, in metric processing order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralReport {
    reports_by_score: Vec<GeneralReportByScore>,
    message_about_significancy: Vec<String>,
    better_model_by_score: Vec<String>,
    /// Decision of the last processed metric
    best_model_index: Option<usize>,
}

impl GeneralReport {
    pub fn reports_by_score(&self) -> &[GeneralReportByScore] {
        &self.reports_by_score
    }

    pub fn message_about_significancy(&self) -> &[String] {
        &self.message_about_significancy
    }

    pub fn better_model_by_score(&self) -> &[String] {
        &self.better_model_by_score
    }

    pub fn best_model_index(&self) -> Option<usize> {
        self.best_model_index
    }

    /// Entry for a metric, by name
    pub fn report_for(&self, score_target: &str) -> Option<&GeneralReportByScore> {
        self.reports_by_score
            .iter()
            .find(|r| r.score_target == score_target)
    }

    pub fn len(&self) -> usize {
        self.reports_by_score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports_by_score.is_empty()
    }

    /// Plain-text summary for terminals
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Experiment Report ({} metrics) ===", self.len());

        for (idx, entry) in self.reports_by_score.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}]", entry.score_target);

            let steps: Vec<&str> = entry
                .ab_tests
                .pipeline_track
                .iter()
                .map(|s| step_label(*s))
                .collect();
            if steps.is_empty() {
                let _ = writeln!(out, "  tests: none");
            } else {
                let _ = writeln!(out, "  tests: {}", steps.join(" -> "));
            }

            for d in &entry.score_described {
                let _ = writeln!(
                    out,
                    "  {:>3}  {:<24} median {:.4}  mean {:.4}  n={}",
                    d.model_index, d.model_name, d.median, d.mean, d.count
                );
            }

            if let Some(msg) = self.message_about_significancy.get(idx) {
                let _ = writeln!(out, "  {}", msg);
            }
            if let Some(msg) = self.better_model_by_score.get(idx) {
                let _ = writeln!(out, "  {}", msg);
            }
        }

        out
    }
}

pub(crate) fn step_label(step: PipelineStep) -> &'static str {
    match step {
        PipelineStep::CheckNormality => "Shapiro-Wilk",
        PipelineStep::CheckHomoscedasticity => "Levene",
        PipelineStep::PerformAnova => "ANOVA",
        PipelineStep::PerformKruskalwallis => "Kruskal-Wallis",
        PipelineStep::PerformMannwhitney => "Mann-Whitney U",
    }
}

/// Accumulates per-metric results; append-only until sealed
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: GeneralReport,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a metric entry together with its decision
    pub fn push(&mut self, mut entry: GeneralReportByScore, decision: Decision) {
        entry.best_model_index = decision.best_model_index;
        self.report
            .message_about_significancy
            .push(decision.significancy_message);
        self.report
            .better_model_by_score
            .push(decision.best_model_message);
        self.report.best_model_index = decision.best_model_index;
        self.report.reports_by_score.push(entry);
    }

    pub fn len(&self) -> usize {
        self.report.reports_by_score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.report.reports_by_score.is_empty()
    }

    /// Finish accumulation
    pub fn seal(self) -> GeneralReport {
        self.report
    }
}
