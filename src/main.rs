use ab_verdict::{
    cli::{Cli, OutputFormat},
    config::ExperimentConfig,
    experiment::ExperimentalPipeline,
    html_output::HtmlOutput,
    json_output::JsonOutput,
    scores::ExperimentInput,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let base = match &args.config {
        Some(path) => ExperimentConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    let config = args.apply_overrides(base);

    let input = ExperimentInput::from_file(&args.input)
        .with_context(|| format!("failed to read input {}", args.input.display()))?;
    let (scores, models) = input.into_parts().context("invalid experiment input")?;

    let mut pipeline = ExperimentalPipeline::new(scores, models, config)
        .context("invalid configuration")?;
    pipeline.run()?;

    if !args.no_export {
        pipeline
            .export_json_results(&args.report_dir)
            .with_context(|| format!("failed to export to {}", args.report_dir.display()))?;
        pipeline
            .export_general_report(&args.report_dir)
            .context("failed to export general report")?;

        if !args.no_html {
            let report = pipeline.get_general_report()?;
            HtmlOutput::new(report, pipeline.models(), &pipeline.config().report_name)
                .write_to(&args.report_dir)
                .context("failed to render HTML report")?;
        }
    }

    let report = pipeline.get_general_report()?;
    match args.format {
        OutputFormat::Text => print!("{}", report.summary()),
        OutputFormat::Json => println!("{}", JsonOutput::new(report, pipeline.models()).to_json()?),
    }

    Ok(())
}
