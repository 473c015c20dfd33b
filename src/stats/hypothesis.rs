// Hypothesis tests used by the AB pipeline
//
// - One-way ANOVA (parametric omnibus, F distribution)
// - Kruskal-Wallis H (non-parametric omnibus, chi-squared approximation)
// - Mann-Whitney U (non-parametric pairwise, normal approximation with
//   tie and continuity correction, two-sided)
//
// Distribution tails come from statrs. A p-value below alpha is significant.

use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal};
use std::cmp::Ordering;

/// Values closer than this are ranked as ties
const TIE_EPSILON: f64 = 1e-12;

/// Raw outcome of a hypothesis test, before alpha is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestStatistic {
    pub statistic: f64,
    /// Two-sided p-value in [0, 1]
    pub p_value: f64,
}

impl TestStatistic {
    /// Returns true if the difference is significant at the given alpha level
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    fn not_significant() -> Self {
        Self {
            statistic: 0.0,
            p_value: 1.0,
        }
    }
}

/// Result of an omnibus test (ANOVA or Kruskal-Wallis) across all models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmnibusTestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub is_significant: bool,
}

impl OmnibusTestResult {
    pub fn new(test: TestStatistic, alpha: f64) -> Self {
        Self {
            statistic: test.statistic,
            p_value: test.p_value,
            is_significant: test.is_significant(alpha),
        }
    }
}

/// Result of a pairwise test between two models
///
/// `model_index_1 < model_index_2` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseTestResult {
    pub model_index_1: usize,
    pub model_index_2: usize,
    pub statistic: f64,
    pub p_value: f64,
    pub is_significant: bool,
}

impl PairwiseTestResult {
    pub fn new(first: usize, second: usize, test: TestStatistic, alpha: f64) -> Self {
        Self {
            model_index_1: first.min(second),
            model_index_2: first.max(second),
            statistic: test.statistic,
            p_value: test.p_value,
            is_significant: test.is_significant(alpha),
        }
    }

    /// True if the pair involves the given model
    pub fn involves(&self, model_index: usize) -> bool {
        self.model_index_1 == model_index || self.model_index_2 == model_index
    }
}

fn check_groups(groups: &[&[f64]], test: &str) -> Result<()> {
    if groups.len() < 2 {
        return Err(ExperimentError::Statistics(format!(
            "{} needs at least 2 groups, got {}",
            test,
            groups.len()
        )));
    }
    if let Some(idx) = groups.iter().position(|g| g.is_empty()) {
        return Err(ExperimentError::Statistics(format!(
            "{}: group {} is empty",
            test, idx
        )));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|&v| v == values[0])
}

/// One-way ANOVA F-test
///
/// F = (SSB / (k - 1)) / (SSW / (N - k)), p from F(k - 1, N - k).
/// Identical groups with zero spread yield F = 0, p = 1.
pub fn one_way_anova(groups: &[&[f64]]) -> Result<TestStatistic> {
    check_groups(groups, "ANOVA")?;

    let k = groups.len();
    let n_total: usize = groups.iter().map(|g| g.len()).sum();
    if n_total <= k {
        return Err(ExperimentError::Statistics(format!(
            "ANOVA needs more observations ({}) than groups ({})",
            n_total, k
        )));
    }

    // Constant groups are decided from the values: their sums of squares only
    // hold rounding noise, which can make F arbitrarily large
    if groups.iter().all(|g| is_constant(g)) {
        let first = groups[0][0];
        return Ok(if groups.iter().all(|g| g[0] == first) {
            TestStatistic::not_significant()
        } else {
            TestStatistic {
                statistic: f64::INFINITY,
                p_value: 0.0,
            }
        });
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n_total as f64;

    let mut ssb = 0.0;
    let mut ssw = 0.0;
    for group in groups {
        let group_mean = mean(group);
        ssb += group.len() as f64 * (group_mean - grand_mean).powi(2);
        ssw += group.iter().map(|x| (x - group_mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (n_total - k) as f64;
    let msb = ssb / df_between;
    let msw = ssw / df_within;

    if msw <= 0.0 {
        // Zero within-group spread: either no difference at all or a perfect split
        return Ok(if msb <= 0.0 {
            TestStatistic::not_significant()
        } else {
            TestStatistic {
                statistic: f64::INFINITY,
                p_value: 0.0,
            }
        });
    }

    let f_stat = msb / msw;
    let dist = FisherSnedecor::new(df_between, df_within)
        .map_err(|e| ExperimentError::Statistics(format!("F distribution: {}", e)))?;

    Ok(TestStatistic {
        statistic: f_stat,
        p_value: dist.sf(f_stat).clamp(0.0, 1.0),
    })
}

/// Kruskal-Wallis H-test
///
/// H = 12 / (N(N+1)) Σ Rᵢ²/nᵢ - 3(N+1), divided by the tie correction
/// 1 - Σ(t³ - t)/(N³ - N). p from χ²(k - 1). All-tied data yields H = 0, p = 1.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<TestStatistic> {
    check_groups(groups, "Kruskal-Wallis")?;

    let k = groups.len();
    let mut combined: Vec<(f64, usize)> = groups
        .iter()
        .enumerate()
        .flat_map(|(gi, g)| g.iter().map(move |&v| (v, gi)))
        .collect();
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let n = combined.len() as f64;
    let ranks = average_ranks(&combined);

    let mut rank_sums = vec![0.0; k];
    for ((_, gi), rank) in combined.iter().zip(ranks.iter()) {
        rank_sums[*gi] += rank;
    }

    let h_sum: f64 = rank_sums
        .iter()
        .zip(groups.iter())
        .map(|(r, g)| r * r / g.len() as f64)
        .sum();
    let h = 12.0 / (n * (n + 1.0)) * h_sum - 3.0 * (n + 1.0);

    let denom = 1.0 - tie_correction(&combined) / (n * n * n - n);
    if denom <= f64::EPSILON {
        return Ok(TestStatistic::not_significant());
    }
    let h = (h / denom).max(0.0);

    let dist = ChiSquared::new((k - 1) as f64)
        .map_err(|e| ExperimentError::Statistics(format!("chi-squared distribution: {}", e)))?;

    Ok(TestStatistic {
        statistic: h,
        p_value: dist.sf(h).clamp(0.0, 1.0),
    })
}

/// Mann-Whitney U test (two-sided)
///
/// The reported statistic is U for the first sample. The p-value uses the
/// normal approximation of max(U₁, U₂) with tie and continuity correction.
pub fn mann_whitney_u(first: &[f64], second: &[f64]) -> Result<TestStatistic> {
    check_groups(&[first, second], "Mann-Whitney U")?;

    let n1 = first.len() as f64;
    let n2 = second.len() as f64;
    let n = n1 + n2;

    let mut combined: Vec<(f64, usize)> = first
        .iter()
        .map(|&v| (v, 0))
        .chain(second.iter().map(|&v| (v, 1)))
        .collect();
    combined.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let ranks = average_ranks(&combined);
    let r1: f64 = combined
        .iter()
        .zip(ranks.iter())
        .filter(|((_, g), _)| *g == 0)
        .map(|(_, r)| r)
        .sum();

    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
    let u2 = n1 * n2 - u1;
    let u = u1.max(u2);

    let mu = n1 * n2 / 2.0;
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_correction(&combined) / (n * (n - 1.0)));
    if variance <= 0.0 {
        // Every observation tied
        return Ok(TestStatistic {
            statistic: u1,
            p_value: 1.0,
        });
    }

    let z = (u - mu - 0.5) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ExperimentError::Statistics(format!("normal distribution: {}", e)))?;

    Ok(TestStatistic {
        statistic: u1,
        p_value: (2.0 * normal.sf(z)).clamp(0.0, 1.0),
    })
}

/// Average ranks (1-based) for values sorted ascending; ties share their mean rank
pub(crate) fn average_ranks(sorted: &[(f64, usize)]) -> Vec<f64> {
    let n = sorted.len();
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && (sorted[j].0 - sorted[i].0).abs() < TIE_EPSILON {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for rank in ranks.iter_mut().take(j).skip(i) {
            *rank = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Σ (t³ - t) over every group of tied values
pub(crate) fn tie_correction(sorted: &[(f64, usize)]) -> f64 {
    let n = sorted.len();
    let mut correction = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && (sorted[j].0 - sorted[i].0).abs() < TIE_EPSILON {
            j += 1;
        }
        let t = (j - i) as f64;
        correction += t * t * t - t;
        i = j;
    }
    correction
}
