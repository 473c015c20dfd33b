// Best-model decision for one metric
//
// - ANOVA significant: highest median among all models
// - Kruskal-Wallis significant: highest median among the winners of the
//   significant pairwise comparisons
// - otherwise: no best model
//
// Medians are compared against a running maximum that starts at zero with a
// strictly-greater rule, so the lowest index wins ties and a metric whose
// medians are all <= 0 has no best model.

use super::ab::PipelineStep;
use crate::report::GeneralReportByScore;
use crate::stats::ScoreDescribed;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Verdict for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub best_model_index: Option<usize>,
    /// Whether the models differ significantly, and by which test
    pub significancy_message: String,
    /// Which model is best and why, or why there is none
    pub best_model_message: String,
}

/// Turns the executed tests of a metric into a [`Decision`]
///
/// Stateless: the same report entry always yields the same decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn decide(&self, entry: &GeneralReportByScore) -> Decision {
        let target = entry.score_target.as_str();
        let ab = &entry.ab_tests;

        if let Some(failure) = &entry.failure {
            return Decision {
                best_model_index: None,
                significancy_message: format!(
                    "No statistical test could be run around {}: {}.",
                    target, failure.reason
                ),
                best_model_message: no_better_model(target),
            };
        }

        let anova_significant = ab.ran(PipelineStep::PerformAnova)
            && ab.anova.as_ref().is_some_and(|r| r.is_significant);
        let kruskal_significant = ab.ran(PipelineStep::PerformKruskalwallis)
            && ab.kruskalwallis.as_ref().is_some_and(|r| r.is_significant);

        if anova_significant {
            let best = highest_median(entry.score_described.iter());
            Decision {
                best_model_index: best.map(|d| d.model_index),
                significancy_message: format!(
                    "Significant difference detected between models (ANOVA) around {}.",
                    target
                ),
                best_model_message: best_model_message(target, best),
            }
        } else if kruskal_significant {
            let significancy_message = format!(
                "Significant difference detected between models (Kruskal-Wallis) around {}.",
                target
            );
            let pairs = significant_pairs(entry);
            if pairs.is_empty() {
                warn!(
                    score_target = target,
                    "Kruskal-Wallis is significant but no pairwise comparison is"
                );
                return Decision {
                    best_model_index: None,
                    significancy_message,
                    best_model_message: format!(
                        "Kruskal-Wallis is significant around {} but no pairwise comparison is, so there is no better model.",
                        target
                    ),
                };
            }

            let winners = pairs
                .into_iter()
                .filter_map(|(first, second)| local_winner(&entry.score_described, first, second));
            let best = highest_median(winners);
            Decision {
                best_model_index: best.map(|d| d.model_index),
                significancy_message,
                best_model_message: best_model_message(target, best),
            }
        } else {
            Decision {
                best_model_index: None,
                significancy_message: format!(
                    "No significant difference detected between models around {}.",
                    target
                ),
                best_model_message: format!(
                    "There is no better model around {} due to lack of significance.",
                    target
                ),
            }
        }
    }
}

/// Pairs to compare after a significant Kruskal-Wallis test
///
/// With two models there is no pairwise escalation: the omnibus test is the
/// comparison of models 0 and 1.
fn significant_pairs(entry: &GeneralReportByScore) -> Vec<(usize, usize)> {
    match &entry.ab_tests.mannwhitney {
        Some(results) => results
            .iter()
            .filter(|r| r.is_significant)
            .map(|r| (r.model_index_1, r.model_index_2))
            .collect(),
        None if entry.score_described.len() == 2 => vec![(0, 1)],
        None => Vec::new(),
    }
}

fn find(described: &[ScoreDescribed], model_index: usize) -> Option<&ScoreDescribed> {
    described.iter().find(|d| d.model_index == model_index)
}

// Higher median of the pair; the second model wins equal medians
fn local_winner(
    described: &[ScoreDescribed],
    first: usize,
    second: usize,
) -> Option<&ScoreDescribed> {
    let a = find(described, first)?;
    let b = find(described, second)?;
    Some(if a.median > b.median { a } else { b })
}

fn highest_median<'a>(
    candidates: impl Iterator<Item = &'a ScoreDescribed>,
) -> Option<&'a ScoreDescribed> {
    let mut max_median = 0.0_f64;
    let mut best = None;
    for candidate in candidates {
        if candidate.median > max_median {
            max_median = candidate.median;
            best = Some(candidate);
        }
    }
    best
}

fn no_better_model(target: &str) -> String {
    format!("There is no better model around {}", target)
}

fn best_model_message(target: &str, best: Option<&ScoreDescribed>) -> String {
    match best {
        Some(d) => format!(
            "Best model based on median: {} (index {}) with median {} around {}",
            d.model_name, d.model_index, d.median, target
        ),
        None => no_better_model(target),
    }
}
