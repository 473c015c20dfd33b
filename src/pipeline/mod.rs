// Per-metric test orchestration and best-model decision
//
// Flow for one metric:
// 1. selection: pick ANOVA or Kruskal-Wallis (pluggable policy)
// 2. ab: run the omnibus test, escalate to pairwise Mann-Whitney U
// 3. decision: turn the executed tests into a best model and narrative

mod ab;
mod decision;
mod selection;

pub use ab::{AbPipeline, AbTestsBundle, PipelineStep};
pub use decision::{Decision, DecisionEngine};
pub use selection::{
    AssumptionCheckedPolicy, NonParametricPolicy, OmnibusFamily, ParametricPolicy, Selection,
    SelectionPolicyKind, TestSelectionPolicy,
};
