// Statistical building blocks for model comparison
//
// This module holds the leaves of the pipeline: descriptive statistics per
// model sample, the assumption checks that choose between parametric and
// non-parametric tests, and the hypothesis tests themselves.
//
// Implementation:
// - Uses statrs' OrderStatistics for quantiles and the median (f64 throughout)
// - Uses statrs for the F, chi-squared and normal distribution tails

mod assumptions;
mod describe;
mod hypothesis;

pub use assumptions::{levene, shapiro_wilk, NormalityTestResult};
pub use describe::{median, ScoreDescribed};
pub use hypothesis::{
    kruskal_wallis, mann_whitney_u, one_way_anova, OmnibusTestResult, PairwiseTestResult,
    TestStatistic,
};
