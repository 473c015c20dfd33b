//! HTML rendering of a general report
//!
//! One section per metric (descriptive statistics, executed tests, pairwise
//! comparisons, verdict) followed by the two narrative lists. Embedded CSS,
//! no external assets.

use crate::error::Result;
use crate::experiment::{file_stem, write_atomic};
use crate::model::ModelRecord;
use crate::report::{step_label, GeneralReport, GeneralReportByScore};
use crate::stats::OmnibusTestResult;
use std::path::{Path, PathBuf};

/// HTML report renderer
#[derive(Debug)]
pub struct HtmlOutput<'a> {
    report: &'a GeneralReport,
    models: &'a [ModelRecord],
    title: String,
}

impl<'a> HtmlOutput<'a> {
    pub fn new(report: &'a GeneralReport, models: &'a [ModelRecord], title: &str) -> Self {
        Self {
            report,
            models,
            title: title.to_string(),
        }
    }

    /// Escape HTML special characters to prevent XSS
    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    /// Generate embedded CSS styles
    fn generate_styles() -> &'static str {
        r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 20px;
            background-color: #f5f5f5;
        }
        h1, h2, h3 {
            color: #333;
        }
        table {
            border-collapse: collapse;
            width: 100%;
            background-color: white;
            box-shadow: 0 1px 3px rgba(0,0,0,0.1);
            margin-bottom: 20px;
        }
        th, td {
            border: 1px solid #ddd;
            padding: 8px;
            text-align: left;
        }
        th {
            background-color: #4a90d9;
            color: white;
            font-weight: bold;
        }
        tr:nth-child(even) {
            background-color: #f9f9f9;
        }
        .metric {
            margin-bottom: 30px;
        }
        .best {
            background-color: #dff0d8 !important;
            font-weight: bold;
        }
        .significant {
            color: #cc0000;
            font-weight: bold;
        }
        .track {
            font-family: monospace;
            color: #555;
        }
        .failure {
            color: #8a6d3b;
            background-color: #fcf8e3;
            padding: 8px;
        }
        .verdict {
            font-style: italic;
        }
        .footer {
            margin-top: 20px;
            font-size: 0.8em;
            color: #888;
            text-align: center;
        }
        "#
    }

    fn render_models(&self) -> String {
        if self.models.is_empty() {
            return String::new();
        }

        let mut html = String::new();
        html.push_str("    <h2>Models</h2>\n");
        html.push_str("    <table>\n");
        html.push_str("        <tr><th>Index</th><th>Name</th><th>Technology</th><th>Kind</th></tr>\n");
        for model in self.models {
            html.push_str(&format!(
                "        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                model.index,
                Self::escape_html(&model.name),
                model.technology,
                model.kind
            ));
        }
        html.push_str("    </table>\n");
        html
    }

    fn render_omnibus(name: &str, result: &OmnibusTestResult) -> String {
        let class = if result.is_significant {
            " class=\"significant\""
        } else {
            ""
        };
        format!(
            "        <tr><td>{}</td><td>{:.4}</td><td{}>{:.6}</td><td>{}</td></tr>\n",
            name,
            result.statistic,
            class,
            result.p_value,
            if result.is_significant { "yes" } else { "no" }
        )
    }

    fn render_metric(&self, idx: usize, entry: &GeneralReportByScore) -> String {
        let mut html = String::new();
        html.push_str("    <div class=\"metric\">\n");
        html.push_str(&format!(
            "    <h2>{}</h2>\n",
            Self::escape_html(&entry.score_target)
        ));

        if let Some(failure) = &entry.failure {
            html.push_str(&format!(
                "    <p class=\"failure\">{}: {}</p>\n",
                Self::escape_html(&failure.kind),
                Self::escape_html(&failure.reason)
            ));
        }

        // Descriptive statistics
        html.push_str("    <table>\n");
        html.push_str("        <tr><th>Model</th><th>n</th><th>mean</th><th>std</th><th>min</th><th>q1</th><th>median</th><th>q3</th><th>max</th></tr>\n");
        for d in &entry.score_described {
            let class = if entry.best_model_index == Some(d.model_index) {
                " class=\"best\""
            } else {
                ""
            };
            html.push_str(&format!(
                "        <tr{}><td>{}</td><td>{}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td></tr>\n",
                class,
                Self::escape_html(&d.model_name),
                d.count,
                d.mean,
                d.std,
                d.min,
                d.q1,
                d.median,
                d.q3,
                d.max
            ));
        }
        html.push_str("    </table>\n");

        let track: Vec<&str> = entry
            .ab_tests
            .pipeline_track
            .iter()
            .map(|s| step_label(*s))
            .collect();
        html.push_str(&format!(
            "    <p class=\"track\">Tests: {}</p>\n",
            if track.is_empty() {
                "none".to_string()
            } else {
                track.join(" &rarr; ")
            }
        ));

        let ab = &entry.ab_tests;
        let omnibus_rows = [
            ("Levene", ab.levene.as_ref()),
            ("ANOVA", ab.anova.as_ref()),
            ("Kruskal-Wallis", ab.kruskalwallis.as_ref()),
        ];
        if omnibus_rows.iter().any(|(_, r)| r.is_some()) {
            html.push_str("    <table>\n");
            html.push_str("        <tr><th>Test</th><th>Statistic</th><th>p-value</th><th>Significant</th></tr>\n");
            for (name, result) in omnibus_rows {
                if let Some(result) = result {
                    html.push_str(&Self::render_omnibus(name, result));
                }
            }
            html.push_str("    </table>\n");
        }

        if let Some(pairs) = &ab.mannwhitney {
            html.push_str("    <h3>Mann-Whitney U</h3>\n");
            html.push_str("    <table>\n");
            html.push_str("        <tr><th>Model</th><th>Model</th><th>U</th><th>p-value</th><th>Significant</th></tr>\n");
            for pair in pairs {
                let name = |i: usize| {
                    entry
                        .score_described
                        .iter()
                        .find(|d| d.model_index == i)
                        .map(|d| Self::escape_html(&d.model_name))
                        .unwrap_or_else(|| i.to_string())
                };
                html.push_str(&format!(
                    "        <tr><td>{}</td><td>{}</td><td>{:.1}</td><td{}>{:.6}</td><td>{}</td></tr>\n",
                    name(pair.model_index_1),
                    name(pair.model_index_2),
                    pair.statistic,
                    if pair.is_significant { " class=\"significant\"" } else { "" },
                    pair.p_value,
                    if pair.is_significant { "yes" } else { "no" }
                ));
            }
            html.push_str("    </table>\n");
        }

        for message in [
            self.report.message_about_significancy().get(idx),
            self.report.better_model_by_score().get(idx),
        ]
        .into_iter()
        .flatten()
        {
            html.push_str(&format!(
                "    <p class=\"verdict\">{}</p>\n",
                Self::escape_html(message)
            ));
        }

        html.push_str("    </div>\n");
        html
    }

    fn render_list(title: &str, items: &[String]) -> String {
        let mut html = format!("    <h2>{}</h2>\n    <ul>\n", title);
        for item in items {
            html.push_str(&format!("        <li>{}</li>\n", Self::escape_html(item)));
        }
        html.push_str("    </ul>\n");
        html
    }

    /// Generate complete HTML document
    pub fn to_html(&self) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n");
        html.push_str("<html lang=\"en\">\n");

        html.push_str("<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        html.push_str(
            "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!(
            "    <title>{}</title>\n",
            Self::escape_html(&self.title)
        ));
        html.push_str("    <style>");
        html.push_str(Self::generate_styles());
        html.push_str("</style>\n");
        html.push_str("</head>\n");

        html.push_str("<body>\n");
        html.push_str(&format!("    <h1>{}</h1>\n", Self::escape_html(&self.title)));

        html.push_str(&self.render_models());

        for (idx, entry) in self.report.reports_by_score().iter().enumerate() {
            html.push_str(&self.render_metric(idx, entry));
        }

        html.push_str(&Self::render_list(
            "Significance",
            self.report.message_about_significancy(),
        ));
        html.push_str(&Self::render_list(
            "Best Models",
            self.report.better_model_by_score(),
        ));

        html.push_str("    <div class=\"footer\">\n");
        html.push_str(&format!(
            "        Generated by ab-verdict {}\n",
            env!("CARGO_PKG_VERSION")
        ));
        html.push_str("    </div>\n");

        html.push_str("</body>\n");
        html.push_str("</html>\n");

        html
    }

    /// Write `<dir>/<title>.html`, creating `dir` if needed
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.html", file_stem(&self.title)));
        write_atomic(&path, self.to_html().as_bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, ModelTechnology};
    use crate::pipeline::{AbTestsBundle, Decision, PipelineStep};
    use crate::report::ReportBuilder;
    use crate::stats::{PairwiseTestResult, ScoreDescribed};

    fn described(idx: usize, name: &str, median: f64) -> ScoreDescribed {
        ScoreDescribed {
            model_index: idx,
            model_name: name.to_string(),
            count: 3,
            mean: median,
            std: 0.0,
            min: median,
            q1: median,
            median,
            q3: median,
            max: median,
        }
    }

    fn report() -> GeneralReport {
        let mut builder = ReportBuilder::new();
        let entry = GeneralReportByScore::new(
            "accuracy",
            vec![
                described(0, "<script>alert(1)</script>", 0.8),
                described(1, "forest", 0.95),
                described(2, "knn", 0.81),
            ],
            AbTestsBundle {
                pipeline_track: vec![
                    PipelineStep::PerformKruskalwallis,
                    PipelineStep::PerformMannwhitney,
                ],
                kruskalwallis: Some(OmnibusTestResult {
                    statistic: 12.0,
                    p_value: 0.002,
                    is_significant: true,
                }),
                mannwhitney: Some(vec![PairwiseTestResult {
                    model_index_1: 0,
                    model_index_2: 1,
                    statistic: 0.0,
                    p_value: 0.01,
                    is_significant: true,
                }]),
                ..Default::default()
            },
        );
        builder.push(
            entry,
            Decision {
                best_model_index: Some(1),
                significancy_message: "Significant difference around accuracy.".to_string(),
                best_model_message: "Best model based on median: forest".to_string(),
            },
        );
        builder.seal()
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(HtmlOutput::escape_html("<script>"), "&lt;script&gt;");
        assert_eq!(HtmlOutput::escape_html("a&b"), "a&amp;b");
        assert_eq!(HtmlOutput::escape_html("\"test\""), "&quot;test&quot;");
        assert_eq!(HtmlOutput::escape_html("'test'"), "&#39;test&#39;");
    }

    #[test]
    fn test_html_basic_structure() {
        let report = report();
        let html = HtmlOutput::new(&report, &[], "general_report").to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>general_report</title>"));
        assert!(html.contains("<h2>accuracy</h2>"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn test_html_escapes_model_names() {
        let report = report();
        let html = HtmlOutput::new(&report, &[], "r").to_html();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn test_html_marks_best_model_and_tests() {
        let report = report();
        let html = HtmlOutput::new(&report, &[], "r").to_html();
        assert!(html.contains("<tr class=\"best\"><td>forest</td>"));
        assert!(html.contains("Kruskal-Wallis &rarr; Mann-Whitney U"));
        assert!(html.contains("<h3>Mann-Whitney U</h3>"));
        assert!(html.contains("<li>Best model based on median: forest</li>"));
    }

    #[test]
    fn test_html_model_table() {
        let report = report();
        let models = vec![ModelRecord {
            index: 0,
            name: "svm".to_string(),
            technology: ModelTechnology::Onnx,
            kind: ModelKind::Regressor,
            object: (),
        }];
        let html = HtmlOutput::new(&report, &models, "r").to_html();
        assert!(html.contains("<td>svm</td><td>onnx</td><td>regressor</td>"));
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        let path = HtmlOutput::new(&report, &[], "weekly report")
            .write_to(dir.path())
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "weekly_report.html");
        assert!(std::fs::read_to_string(path).unwrap().contains("forest"));
    }
}
