//! General report aggregator
//!
//! Runs the AB pipeline and the decision engine once per metric and collects
//! the verdicts into a [`GeneralReport`].
//!
//! # Example
//!
//! ```ignore
//! use ab_verdict::config::ExperimentConfig;
//! use ab_verdict::experiment::ExperimentalPipeline;
//! use ab_verdict::scores::ScoreTable;
//!
//! let mut scores = ScoreTable::new();
//! scores.insert("accuracy", vec![vec![0.80, 0.82, 0.81], vec![0.90, 0.92, 0.91]])?;
//!
//! let mut pipeline = ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default())?;
//! pipeline.run()?;
//! pipeline.export_json_results("reports".as_ref())?;
//! ```

use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::model::{resolve_model_names, ModelProvider, ModelRecord};
use crate::pipeline::{AbPipeline, Decision, DecisionEngine, TestSelectionPolicy};
use crate::report::{GeneralReport, GeneralReportByScore, MetricFailure, ReportBuilder};
use crate::scores::{MetricSamples, ScoreTable};
use crate::stats::ScoreDescribed;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Span};

/// Orchestrates one experiment run over every metric of a score table
#[derive(Debug)]
pub struct ExperimentalPipeline {
    scores: ScoreTable,
    models: Vec<ModelRecord>,
    config: ExperimentConfig,
    ab: AbPipeline,
    engine: DecisionEngine,
    span: Span,
    report: Option<GeneralReport>,
}

impl ExperimentalPipeline {
    /// Fails when the configuration does not validate
    pub fn new(
        scores: ScoreTable,
        models: Vec<ModelRecord>,
        config: ExperimentConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !models.is_empty() && models.len() < scores.model_count() {
            warn!(
                records = models.len(),
                samples = scores.model_count(),
                "fewer model records than samples, unnamed models use model_<index>"
            );
        }
        let span = info_span!("experiment", report_name = %config.report_name);
        Ok(Self {
            scores,
            models,
            ab: AbPipeline::new(&config),
            engine: DecisionEngine,
            config,
            span,
            report: None,
        })
    }

    /// Build from a model provider; model handles are not kept
    pub fn from_provider<P: ModelProvider>(
        scores: ScoreTable,
        provider: &P,
        config: ExperimentConfig,
    ) -> Result<Self> {
        let models = provider.load()?.iter().map(|r| r.detached()).collect();
        Self::new(scores, models, config)
    }

    /// Log under a caller-provided span instead of the default `experiment` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replace the test selection policy chosen by the configuration
    pub fn with_policy(mut self, policy: Box<dyn TestSelectionPolicy>) -> Self {
        self.ab = self.ab.with_policy(policy);
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn models(&self) -> &[ModelRecord] {
        &self.models
    }

    /// Process every metric, in input order
    ///
    /// Per-metric failures become degraded entries; running again replaces
    /// the previous report.
    pub fn run(&mut self) -> Result<&GeneralReport> {
        let span = self.span.clone();
        let _enter = span.enter();
        info!(
            metrics = self.scores.len(),
            parallel = self.config.parallel,
            "running experiment"
        );

        let results = if self.config.parallel {
            self.run_parallel(&span)?
        } else {
            self.scores
                .iter()
                .map(|metric| self.process_metric(metric, &span))
                .collect()
        };

        let mut builder = ReportBuilder::new();
        for (entry, decision) in results {
            builder.push(entry, decision);
        }
        info!(metrics = builder.len(), "experiment finished");

        Ok(&*self.report.insert(builder.seal()))
    }

    // One scoped worker per metric; results come back in input order
    fn run_parallel(&self, span: &Span) -> Result<Vec<(GeneralReportByScore, Decision)>> {
        crossbeam::scope(|scope| {
            let handles: Vec<_> = self
                .scores
                .iter()
                .map(|metric| {
                    let handle = scope.spawn(move |_| self.process_metric(metric, span));
                    (metric, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(metric, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        let err = ExperimentError::Statistics(format!(
                            "worker for '{}' panicked",
                            metric.metric
                        ));
                        self.degrade(metric, &err)
                    })
                })
                .collect()
        })
        .map_err(|_| ExperimentError::Statistics("metric worker scope panicked".to_string()))
    }

    fn process_metric(
        &self,
        metric: &MetricSamples,
        parent: &Span,
    ) -> (GeneralReportByScore, Decision) {
        let span = info_span!(parent: parent, "metric", score_target = %metric.metric);
        let _enter = span.enter();

        let names = resolve_model_names(&self.models, metric.samples.len());
        let outcome = self
            .ab
            .run(&metric.metric, &metric.samples)
            .and_then(|bundle| Ok((bundle, describe(&names, &metric.samples)?)));

        let entry = match outcome {
            Ok((bundle, described)) => {
                GeneralReportByScore::new(&metric.metric, described, bundle)
            }
            Err(err) => return self.degrade(metric, &err),
        };

        let decision = self.engine.decide(&entry);
        info!(
            best_model_index = ?decision.best_model_index,
            "{}",
            decision.significancy_message
        );
        (entry, decision)
    }

    fn degrade(
        &self,
        metric: &MetricSamples,
        err: &ExperimentError,
    ) -> (GeneralReportByScore, Decision) {
        if err.is_metric_scoped() {
            warn!(score_target = %metric.metric, error = %err, "metric degraded");
        } else {
            tracing::error!(score_target = %metric.metric, error = %err, "metric failed");
        }
        let names = resolve_model_names(&self.models, metric.samples.len());
        let described = metric
            .samples
            .iter()
            .enumerate()
            .filter_map(|(idx, sample)| {
                ScoreDescribed::from_sample(idx, &names[idx], sample).ok()
            })
            .collect();
        let entry = GeneralReportByScore::degraded(
            &metric.metric,
            described,
            MetricFailure::from_error(err),
        );
        let decision = self.engine.decide(&entry);
        (entry, decision)
    }

    /// The report of the last run
    pub fn get_general_report(&self) -> Result<&GeneralReport> {
        self.report.as_ref().ok_or(ExperimentError::NotRun)
    }

    /// Write `<dir>/<metric>.json` for every metric, creating `dir` if needed
    ///
    /// Metric names that sanitize to the same file name, or to the general
    /// report's, get a `_1`, `_2`, ... suffix. Each file goes through a
    /// temporary sibling and a rename, so an error leaves previously written
    /// files intact. Returns the written paths, one per metric.
    pub fn export_json_results(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let report = self.get_general_report()?;
        fs::create_dir_all(dir)?;

        let stems = unique_stems(
            report.reports_by_score().iter().map(|e| e.score_target.as_str()),
            &file_stem(&self.config.report_name),
        );
        let mut written = Vec::with_capacity(report.len());
        for (entry, stem) in report.reports_by_score().iter().zip(stems) {
            let path = dir.join(format!("{}.json", stem));
            write_json_atomic(&path, entry)?;
            debug!(path = %path.display(), "exported metric report");
            written.push(path);
        }
        Ok(written)
    }

    /// Write the whole report as `<dir>/<report_name>.json`
    pub fn export_general_report(&self, dir: &Path) -> Result<PathBuf> {
        let report = self.get_general_report()?;
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", file_stem(&self.config.report_name)));
        write_json_atomic(&path, report)?;
        Ok(path)
    }
}

fn describe(names: &[String], samples: &[Vec<f64>]) -> Result<Vec<ScoreDescribed>> {
    samples
        .iter()
        .zip(names)
        .enumerate()
        .map(|(idx, (sample, name))| ScoreDescribed::from_sample(idx, name, sample))
        .collect()
}

/// File name stem for a metric: path separators and other unsafe characters
/// become `_`
pub(crate) fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "metric".to_string()
    } else {
        stem
    }
}

// Distinct file stems for the given names, never equal to `reserved`
fn unique_stems<'a>(names: impl Iterator<Item = &'a str>, reserved: &str) -> Vec<String> {
    let mut used = HashSet::from([reserved.to_string()]);
    names
        .map(|name| {
            let base = file_stem(name);
            let mut stem = base.clone();
            let mut suffix = 1;
            while !used.insert(stem.clone()) {
                stem = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            stem
        })
        .collect()
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStep;

    fn table(entries: &[(&str, Vec<Vec<f64>>)]) -> ScoreTable {
        let mut table = ScoreTable::new();
        for (metric, samples) in entries {
            table.insert(metric, samples.clone()).unwrap();
        }
        table
    }

    fn low() -> Vec<f64> {
        vec![0.70, 0.72, 0.71, 0.73, 0.69, 0.72, 0.70, 0.71, 0.74, 0.68]
    }

    fn high() -> Vec<f64> {
        low().iter().map(|v| v + 0.2).collect()
    }

    #[test]
    fn test_report_before_run() {
        let pipeline =
            ExperimentalPipeline::new(ScoreTable::new(), Vec::new(), ExperimentConfig::default())
                .unwrap();
        assert!(matches!(
            pipeline.get_general_report(),
            Err(ExperimentError::NotRun)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExperimentConfig {
            significance_level: 0.0,
            ..ExperimentConfig::default()
        };
        assert!(ExperimentalPipeline::new(ScoreTable::new(), Vec::new(), config).is_err());
    }

    #[test]
    fn test_every_metric_yields_an_entry() {
        let scores = table(&[
            ("accuracy", vec![low(), high()]),
            ("single", vec![low()]),
            ("broken", vec![low(), vec![]]),
        ]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default()).unwrap();
        let report = pipeline.run().unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.message_about_significancy().len(), 3);
        assert_eq!(report.better_model_by_score().len(), 3);

        let accuracy = report.report_for("accuracy").unwrap();
        assert_eq!(accuracy.best_model_index, Some(1));

        let single = report.report_for("single").unwrap();
        assert_eq!(single.failure.as_ref().unwrap().kind, "insufficient_groups");
        assert!(single.ab_tests.pipeline_track.is_empty());

        let broken = report.report_for("broken").unwrap();
        assert_eq!(
            broken.failure.as_ref().unwrap().kind,
            "unsupported_test_condition"
        );
        assert_eq!(broken.score_described.len(), 1);
        assert!(report.message_about_significancy()[2].contains("No statistical test could be run"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let scores = table(&[
            ("accuracy", vec![low(), high(), low()]),
            ("f1", vec![low(), low()]),
            ("recall", vec![high(), low()]),
        ]);

        let mut sequential =
            ExperimentalPipeline::new(scores.clone(), Vec::new(), ExperimentConfig::default())
                .unwrap();
        let config = ExperimentConfig {
            parallel: true,
            ..ExperimentConfig::default()
        };
        let mut parallel = ExperimentalPipeline::new(scores, Vec::new(), config).unwrap();

        assert_eq!(sequential.run().unwrap(), parallel.run().unwrap());
    }

    #[test]
    fn test_model_names_from_records() {
        let models = vec![ModelRecord {
            index: 1,
            name: "gbm".to_string(),
            technology: crate::model::ModelTechnology::Sklearn,
            kind: crate::model::ModelKind::Classifier,
            object: (),
        }];
        let scores = table(&[("accuracy", vec![low(), high()])]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, models, ExperimentConfig::default()).unwrap();
        let report = pipeline.run().unwrap();

        let described = &report.reports_by_score()[0].score_described;
        assert_eq!(described[0].model_name, "model_0");
        assert_eq!(described[1].model_name, "gbm");
        assert!(report.better_model_by_score()[0].contains("gbm"));
    }

    #[test]
    fn test_custom_span_is_accepted() {
        let scores = table(&[("f1", vec![low(), low()])]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default())
                .unwrap()
                .with_span(tracing::info_span!("nightly"));
        let report = pipeline.run().unwrap();
        assert!(!report.reports_by_score()[0]
            .ab_tests
            .ran(PipelineStep::PerformMannwhitney));
    }

    #[test]
    fn test_export_json_results() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("reports");
        let scores = table(&[("accuracy", vec![low(), high()]), ("a/b", vec![low(), low()])]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default()).unwrap();
        pipeline.run().unwrap();

        let paths = pipeline.export_json_results(&out).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(out.join("accuracy.json").exists());
        assert!(out.join("a_b.json").exists());

        let content = fs::read_to_string(out.join("accuracy.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["score_target"], "accuracy");
        assert_eq!(json["best_model_index"], 1);

        let leftovers = fs::read_dir(&out)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.path().to_string_lossy().ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_export_before_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            ExperimentalPipeline::new(ScoreTable::new(), Vec::new(), ExperimentConfig::default())
                .unwrap();
        assert!(matches!(
            pipeline.export_json_results(dir.path()),
            Err(ExperimentError::NotRun)
        ));
    }

    #[test]
    fn test_export_general_report() {
        let dir = tempfile::tempdir().unwrap();
        let scores = table(&[("f1", vec![low(), low()])]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default()).unwrap();
        pipeline.run().unwrap();

        let path = pipeline.export_general_report(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "general_report.json");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["reports_by_score"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_export_colliding_metric_names() {
        let dir = tempfile::tempdir().unwrap();
        let scores = table(&[
            ("a/b", vec![low(), low()]),
            ("a_b", vec![low(), high()]),
            ("general_report", vec![low(), low()]),
        ]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default()).unwrap();
        pipeline.run().unwrap();

        let paths = pipeline.export_json_results(dir.path()).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("a_b.json"),
                dir.path().join("a_b_1.json"),
                dir.path().join("general_report_1.json"),
            ]
        );
        pipeline.export_general_report(dir.path()).unwrap();

        for (path, target) in paths.iter().zip(["a/b", "a_b", "general_report"]) {
            let json: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(json["score_target"], target);
        }
    }

    #[test]
    fn test_unique_stems() {
        let stems = unique_stems(["x", "x", "x_1", "report"].into_iter(), "report");
        assert_eq!(stems, vec!["x", "x_1", "x_1_1", "report_1"]);
    }

    #[test]
    fn test_export_under_a_regular_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let scores = table(&[("accuracy", vec![low(), high()])]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default()).unwrap();
        pipeline.run().unwrap();

        let result = pipeline.export_json_results(&blocker.join("reports"));
        assert!(matches!(result, Err(ExperimentError::Io(_))));
        assert_eq!(pipeline.get_general_report().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_export_keeps_written_files() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the second metric's file should go
        fs::create_dir(dir.path().join("f1.json")).unwrap();

        let scores = table(&[("accuracy", vec![low(), high()]), ("f1", vec![low(), low()])]);
        let mut pipeline =
            ExperimentalPipeline::new(scores, Vec::new(), ExperimentConfig::default()).unwrap();
        pipeline.run().unwrap();

        let result = pipeline.export_json_results(dir.path());
        assert!(matches!(result, Err(ExperimentError::Io(_))));

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("accuracy.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["score_target"], "accuracy");
        assert!(!dir.path().join("f1.json.tmp").exists());
        assert!(pipeline.get_general_report().is_ok());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("accuracy"), "accuracy");
        assert_eq!(file_stem("r2 score"), "r2_score");
        assert_eq!(file_stem("../etc"), ".._etc");
        assert_eq!(file_stem(".."), "metric");
        assert_eq!(file_stem(""), "metric");
    }
}
