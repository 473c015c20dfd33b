// Assumption checks that decide between ANOVA and Kruskal-Wallis
//
// - Shapiro-Wilk W test for normality, Royston (1992, 1995) approximation,
//   valid for 3 <= n <= 5000
// - Levene's test for equal variances, Brown-Forsythe (median-centred) variant

use super::describe::median;
use super::hypothesis::{one_way_anova, TestStatistic};
use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;

// Royston polynomial coefficients (AS R94)
const SW_C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const SW_C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const SW_C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const SW_C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const SW_C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const SW_C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const SW_G: [f64; 2] = [-2.273, 0.459];

/// Normality check of one model's sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityTestResult {
    pub model_index: usize,
    /// W statistic; absent when the sample cannot be tested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub is_normal: bool,
}

impl NormalityTestResult {
    /// Run Shapiro-Wilk on a sample. Untestable samples (fewer than 3
    /// observations, more than 5000, or zero range) count as not normal.
    pub fn check(model_index: usize, sample: &[f64], alpha: f64) -> Result<Self> {
        Ok(match shapiro_wilk(sample)? {
            Some(test) => Self {
                model_index,
                statistic: Some(test.statistic),
                p_value: Some(test.p_value),
                is_normal: !test.is_significant(alpha),
            },
            None => Self {
                model_index,
                statistic: None,
                p_value: None,
                is_normal: false,
            },
        })
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0)
        .map_err(|e| ExperimentError::Statistics(format!("normal distribution: {}", e)))
}

// c[0] + c[1]*x + c[2]*x^2 + ...
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &coef| acc * x + coef)
}

/// Shapiro-Wilk test for normality
///
/// Returns `Ok(None)` when W is undefined for the sample.
pub fn shapiro_wilk(sample: &[f64]) -> Result<Option<TestStatistic>> {
    let n = sample.len();
    if !(3..=5000).contains(&n) {
        return Ok(None);
    }

    let mut x = sample.to_vec();
    x.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    if x[n - 1] - x[0] < 1e-300 || ss < 1e-300 {
        return Ok(None);
    }

    if n == 3 {
        // a = [sqrt(1/2), 0, -sqrt(1/2)] and an exact p-value
        let numerator = std::f64::consts::FRAC_1_SQRT_2 * (x[2] - x[0]);
        let w = (numerator * numerator / ss).clamp(0.75, 1.0);
        let p = 1.0 - (6.0 / std::f64::consts::PI) * w.sqrt().acos();
        return Ok(Some(TestStatistic {
            statistic: w,
            p_value: p.clamp(0.0, 1.0),
        }));
    }

    let normal = standard_normal()?;
    let half = n / 2;
    let nf = n as f64;

    // Blom scores for the lower half (negative values)
    let m: Vec<f64> = (0..half)
        .map(|i| normal.inverse_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let mut a = vec![0.0; half];
    a[0] = poly(&SW_C1, rsn) - m[0] / ssumm2;
    let (corrected, fac_sq, one_minus) = if n <= 5 {
        (1, summ2 - 2.0 * m[0] * m[0], 1.0 - 2.0 * a[0] * a[0])
    } else {
        a[1] = poly(&SW_C2, rsn) - m[1] / ssumm2;
        (
            2,
            summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1],
            1.0 - 2.0 * a[0] * a[0] - 2.0 * a[1] * a[1],
        )
    };
    if fac_sq <= 0.0 || one_minus <= 0.0 {
        return Ok(None);
    }
    let fac = (fac_sq / one_minus).sqrt();
    for (ai, mi) in a.iter_mut().zip(m.iter()).skip(corrected) {
        *ai = -mi / fac;
    }

    let sa: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (sa * sa / ss).min(1.0);

    Ok(Some(TestStatistic {
        statistic: w,
        p_value: shapiro_p_value(w, n, &normal),
    }))
}

fn shapiro_p_value(w: f64, n: usize, normal: &Normal) -> f64 {
    let nf = n as f64;
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let y = w1.ln();

    let z = if n <= 11 {
        let gamma = poly(&SW_G, nf);
        if y >= gamma {
            return 0.0;
        }
        let m = poly(&SW_C3, nf);
        let s = poly(&SW_C4, nf).exp();
        (-(gamma - y).ln() - m) / s
    } else {
        let ln_n = nf.ln();
        let m = poly(&SW_C5, ln_n);
        let s = poly(&SW_C6, ln_n).exp();
        (y - m) / s
    };

    normal.sf(z).clamp(0.0, 1.0)
}

/// Levene's test (Brown-Forsythe): ANOVA on |x - median(group)|
///
/// Every group needs at least two observations.
pub fn levene(groups: &[&[f64]]) -> Result<TestStatistic> {
    if let Some(idx) = groups.iter().position(|g| g.len() < 2) {
        return Err(ExperimentError::Statistics(format!(
            "Levene's test: group {} has fewer than 2 observations",
            idx
        )));
    }

    let deviations = groups
        .iter()
        .map(|g| {
            let center = median(g)?;
            Ok(g.iter().map(|v| (v - center).abs()).collect())
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;
    let refs: Vec<&[f64]> = deviations.iter().map(|d| d.as_slice()).collect();

    one_way_anova(&refs)
}
