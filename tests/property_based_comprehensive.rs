//! Property-based tests for the statistical pipeline
//!
//! Core properties covered:
//! 1. Hypothesis tests always return p-values in [0, 1]
//! 2. Pairwise escalation only with a significant omnibus test and N > 2
//! 3. Decision engine determinism and strictly-greater tie-break
//! 4. Every metric yields exactly one report entry

use ab_verdict::config::ExperimentConfig;
use ab_verdict::experiment::ExperimentalPipeline;
use ab_verdict::pipeline::{
    AbPipeline, AbTestsBundle, DecisionEngine, PipelineStep, SelectionPolicyKind,
};
use ab_verdict::report::GeneralReportByScore;
use ab_verdict::scores::ScoreTable;
use ab_verdict::stats::{
    kruskal_wallis, mann_whitney_u, one_way_anova, OmnibusTestResult, ScoreDescribed,
};
use proptest::prelude::*;

fn sample(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..1.0, min_len..12)
}

fn samples(models: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(sample(2), models)
}

fn policy() -> impl Strategy<Value = SelectionPolicyKind> {
    prop_oneof![
        Just(SelectionPolicyKind::AssumptionChecked),
        Just(SelectionPolicyKind::NonParametric),
        Just(SelectionPolicyKind::Parametric),
    ]
}

fn pipeline(policy: SelectionPolicyKind) -> AbPipeline {
    AbPipeline::new(&ExperimentConfig {
        policy,
        ..ExperimentConfig::default()
    })
}

fn entry_for(target: &str, samples: &[Vec<f64>], bundle: AbTestsBundle) -> GeneralReportByScore {
    let described = samples
        .iter()
        .enumerate()
        .map(|(i, s)| ScoreDescribed::from_sample(i, &format!("model_{}", i), s).unwrap())
        .collect();
    GeneralReportByScore::new(target, described, bundle)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_p_values_in_unit_interval(groups in samples(2..5)) {
        let refs: Vec<&[f64]> = groups.iter().map(|g| g.as_slice()).collect();

        let anova = one_way_anova(&refs).unwrap();
        prop_assert!((0.0..=1.0).contains(&anova.p_value));

        let kw = kruskal_wallis(&refs).unwrap();
        prop_assert!((0.0..=1.0).contains(&kw.p_value));
        prop_assert!(kw.statistic >= 0.0);

        let mw = mann_whitney_u(refs[0], refs[1]).unwrap();
        prop_assert!((0.0..=1.0).contains(&mw.p_value));
        prop_assert!(mw.statistic >= 0.0);
        prop_assert!(mw.statistic <= (refs[0].len() * refs[1].len()) as f64);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_pairwise_only_when_escalated(groups in samples(2..6), kind in policy()) {
        let bundle = pipeline(kind).run("metric", &groups).unwrap();
        let omnibus = bundle.omnibus().unwrap();

        // Exactly one omnibus family
        prop_assert!(bundle.anova.is_some() != bundle.kruskalwallis.is_some());

        let escalate = omnibus.is_significant && groups.len() > 2;
        prop_assert_eq!(bundle.mannwhitney.is_some(), escalate);
        prop_assert_eq!(bundle.ran(PipelineStep::PerformMannwhitney), escalate);

        if let Some(pairs) = &bundle.mannwhitney {
            let n = groups.len();
            prop_assert_eq!(pairs.len(), n * (n - 1) / 2);
            for pair in pairs {
                prop_assert!(pair.model_index_1 < pair.model_index_2);
            }
        }
    }

    #[test]
    fn prop_two_models_never_escalate(a in sample(2), b in sample(2), kind in policy()) {
        let bundle = pipeline(kind).run("metric", &[a, b]).unwrap();
        prop_assert!(bundle.mannwhitney.is_none());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_decision_is_deterministic(groups in samples(2..5)) {
        let bundle = pipeline(SelectionPolicyKind::NonParametric)
            .run("metric", &groups)
            .unwrap();
        let entry = entry_for("metric", &groups, bundle);

        let first = DecisionEngine.decide(&entry);
        let second = DecisionEngine.decide(&entry);
        prop_assert_eq!(&first, &second);

        if let Some(best) = first.best_model_index {
            prop_assert!(best < groups.len());
            prop_assert!(entry.ab_tests.omnibus().unwrap().is_significant);
        }
    }

    #[test]
    fn prop_anova_best_is_first_maximum(medians in prop::collection::vec(-1.0f64..1.0, 2..8)) {
        // Constant samples make the median explicit
        let groups: Vec<Vec<f64>> = medians.iter().map(|m| vec![*m, *m]).collect();
        let bundle = AbTestsBundle {
            pipeline_track: vec![PipelineStep::PerformAnova],
            anova: Some(OmnibusTestResult { statistic: 10.0, p_value: 0.001, is_significant: true }),
            ..Default::default()
        };
        let entry = entry_for("metric", &groups, bundle);
        let decision = DecisionEngine.decide(&entry);

        let max = medians.iter().cloned().fold(f64::MIN, f64::max);
        let expected = if max > 0.0 {
            medians.iter().position(|m| *m == max)
        } else {
            None
        };
        prop_assert_eq!(decision.best_model_index, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_every_metric_has_an_entry(
        metrics in prop::collection::vec(samples(0..4), 1..5),
        parallel in any::<bool>(),
    ) {
        let mut scores = ScoreTable::new();
        for (i, groups) in metrics.iter().enumerate() {
            scores.insert(&format!("metric_{}", i), groups.clone()).unwrap();
        }
        let config = ExperimentConfig { parallel, ..ExperimentConfig::default() };
        let mut pipeline = ExperimentalPipeline::new(scores, Vec::new(), config).unwrap();
        let report = pipeline.run().unwrap();

        prop_assert_eq!(report.len(), metrics.len());
        prop_assert_eq!(report.message_about_significancy().len(), metrics.len());
        prop_assert_eq!(report.better_model_by_score().len(), metrics.len());
        for (entry, groups) in report.reports_by_score().iter().zip(&metrics) {
            prop_assert_eq!(entry.is_degraded(), groups.len() < 2);
        }
    }
}
