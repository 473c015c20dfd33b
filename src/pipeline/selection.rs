// Omnibus test selection
//
// A selection policy looks at the raw samples of one metric and decides which
// omnibus family applies. The default policy checks the ANOVA assumptions:
// - normality of every sample (Shapiro-Wilk)
// - homogeneity of variances across samples (Levene, Brown-Forsythe variant)
// and falls back to Kruskal-Wallis as soon as one of them fails.

use crate::error::Result;
use crate::stats::{levene, NormalityTestResult, OmnibusTestResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Omnibus test family run for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmnibusFamily {
    Anova,
    KruskalWallis,
}

/// Outcome of a selection: the family plus the checks that led to it
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub family: OmnibusFamily,
    /// One normality result per model, when normality was checked
    pub shapiro: Option<Vec<NormalityTestResult>>,
    /// Levene's test; significant means the variances differ
    pub levene: Option<OmnibusTestResult>,
}

impl Selection {
    fn unchecked(family: OmnibusFamily) -> Self {
        Self {
            family,
            shapiro: None,
            levene: None,
        }
    }
}

/// Decides which omnibus test applies to a metric's samples
///
/// `alpha` is the significance level of the assumption checks.
pub trait TestSelectionPolicy: Send + Sync {
    fn select(&self, samples: &[&[f64]], alpha: f64) -> Result<Selection>;
}

/// ANOVA when every sample looks normal and variances are homogeneous,
/// Kruskal-Wallis otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumptionCheckedPolicy;

impl TestSelectionPolicy for AssumptionCheckedPolicy {
    fn select(&self, samples: &[&[f64]], alpha: f64) -> Result<Selection> {
        let shapiro = samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| NormalityTestResult::check(idx, sample, alpha))
            .collect::<Result<Vec<_>>>()?;

        if let Some(first) = shapiro.iter().find(|r| !r.is_normal) {
            debug!(model_index = first.model_index, "sample not normal, using Kruskal-Wallis");
            return Ok(Selection {
                family: OmnibusFamily::KruskalWallis,
                shapiro: Some(shapiro),
                levene: None,
            });
        }

        // Every sample passed Shapiro-Wilk, so each has at least 3 observations
        let levene = OmnibusTestResult::new(levene(samples)?, alpha);
        let family = if levene.is_significant {
            debug!(p_value = levene.p_value, "variances differ, using Kruskal-Wallis");
            OmnibusFamily::KruskalWallis
        } else {
            OmnibusFamily::Anova
        };

        Ok(Selection {
            family,
            shapiro: Some(shapiro),
            levene: Some(levene),
        })
    }
}

/// Always Kruskal-Wallis
#[derive(Debug, Clone, Copy, Default)]
pub struct NonParametricPolicy;

impl TestSelectionPolicy for NonParametricPolicy {
    fn select(&self, _samples: &[&[f64]], _alpha: f64) -> Result<Selection> {
        Ok(Selection::unchecked(OmnibusFamily::KruskalWallis))
    }
}

/// Always ANOVA
#[derive(Debug, Clone, Copy, Default)]
pub struct ParametricPolicy;

impl TestSelectionPolicy for ParametricPolicy {
    fn select(&self, _samples: &[&[f64]], _alpha: f64) -> Result<Selection> {
        Ok(Selection::unchecked(OmnibusFamily::Anova))
    }
}

/// Built-in selection policies, as named in configuration files and on the CLI
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum SelectionPolicyKind {
    /// Check normality and variances, then pick ANOVA or Kruskal-Wallis
    #[default]
    #[serde(rename = "assumption-checked")]
    #[value(name = "assumption-checked")]
    AssumptionChecked,
    /// Always run Kruskal-Wallis
    #[serde(rename = "nonparametric")]
    #[value(name = "nonparametric")]
    NonParametric,
    /// Always run ANOVA
    #[serde(rename = "parametric")]
    #[value(name = "parametric")]
    Parametric,
}

impl SelectionPolicyKind {
    pub fn policy(self) -> Box<dyn TestSelectionPolicy> {
        match self {
            Self::AssumptionChecked => Box::new(AssumptionCheckedPolicy),
            Self::NonParametric => Box::new(NonParametricPolicy),
            Self::Parametric => Box::new(ParametricPolicy),
        }
    }
}
