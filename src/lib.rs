//! ab-verdict - Statistical comparison of trained models
//!
//! This library decides, per scoring metric, whether the score samples of
//! several models differ significantly (ANOVA or Kruskal-Wallis, escalating to
//! pairwise Mann-Whitney U tests) and names the best model by median score.

pub mod cli;
pub mod config;
pub mod error;
pub mod experiment;
pub mod html_output;
pub mod json_output;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod scores;
pub mod stats;
