//! CLI argument parsing for ab-verdict

use crate::config::ExperimentConfig;
use crate::pipeline::SelectionPolicyKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    Text,
    /// JSON document for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ab-verdict")]
#[command(version)]
#[command(about = "Statistical comparison of trained models and best-model selection per metric", long_about = None)]
pub struct Cli {
    /// Experiment input (JSON with per-metric score samples)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Significance level for the omnibus and pairwise tests (overrides the config file)
    #[arg(short, long, value_name = "ALPHA")]
    pub alpha: Option<f64>,

    /// Omnibus test selection policy (overrides the config file)
    #[arg(long, value_enum)]
    pub policy: Option<SelectionPolicyKind>,

    /// Process metrics in parallel, one worker per metric
    #[arg(long)]
    pub parallel: bool,

    /// Directory receiving the per-metric JSON files and the rendered report
    #[arg(long = "report-dir", value_name = "DIR", default_value = "reports")]
    pub report_dir: PathBuf,

    /// Base name of the general report files (overrides the config file)
    #[arg(long = "report-name", value_name = "NAME")]
    pub report_name: Option<String>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Do not render the HTML report
    #[arg(long = "no-html")]
    pub no_html: bool,

    /// Do not write anything to the report directory
    #[arg(long = "no-export")]
    pub no_export: bool,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a base configuration
    pub fn apply_overrides(&self, mut config: ExperimentConfig) -> ExperimentConfig {
        if let Some(alpha) = self.alpha {
            config.significance_level = alpha;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if self.parallel {
            config.parallel = true;
        }
        if let Some(name) = &self.report_name {
            config.report_name = name.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_input() {
        let cli = Cli::parse_from(["ab-verdict", "scores.json"]);
        assert_eq!(cli.input, PathBuf::from("scores.json"));
        assert_eq!(cli.report_dir, PathBuf::from("reports"));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.parallel);
        assert!(!cli.no_html);
        assert!(!cli.no_export);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["ab-verdict"]).is_err());
    }

    #[test]
    fn test_cli_policy_names() {
        let cli = Cli::parse_from(["ab-verdict", "in.json", "--policy", "nonparametric"]);
        assert_eq!(cli.policy, Some(SelectionPolicyKind::NonParametric));

        let cli = Cli::parse_from(["ab-verdict", "in.json", "--policy", "assumption-checked"]);
        assert_eq!(cli.policy, Some(SelectionPolicyKind::AssumptionChecked));

        assert!(Cli::try_parse_from(["ab-verdict", "in.json", "--policy", "bayes"]).is_err());
    }

    #[test]
    fn test_cli_format_json() {
        let cli = Cli::parse_from(["ab-verdict", "in.json", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let cli = Cli::parse_from([
            "ab-verdict",
            "in.json",
            "--alpha",
            "0.01",
            "--policy",
            "parametric",
            "--parallel",
            "--report-name",
            "weekly",
        ]);
        let config = cli.apply_overrides(ExperimentConfig::permissive());
        assert_eq!(config.significance_level, 0.01);
        assert_eq!(config.policy, SelectionPolicyKind::Parametric);
        assert!(config.parallel);
        assert_eq!(config.report_name, "weekly");
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let cli = Cli::parse_from(["ab-verdict", "in.json"]);
        let config = cli.apply_overrides(ExperimentConfig::strict());
        assert_eq!(config, ExperimentConfig::strict());
    }
}
