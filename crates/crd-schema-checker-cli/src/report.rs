//! Rendering of comparator findings.

use crd_schema_checker::{ComparatorRegistry, ComparisonResults};
use serde::Serialize;
use snafu::{ResultExt, Snafu};

use crate::cli::OutputFormat;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize report as JSON"))]
    SerializeJson { source: serde_json::Error },
}

/// The results of all comparators for one CRD.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdReport {
    pub crd: String,
    pub results: Vec<ComparisonResults>,
}

impl CrdReport {
    pub fn error_count(&self) -> usize {
        self.results.iter().map(|results| results.errors.len()).sum()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparatorDescription {
    name: &'static str,
    why_it_matters: &'static str,
}

pub fn render(reports: &[CrdReport], format: OutputFormat) -> Result<String, Error> {
    match format {
        OutputFormat::Text => Ok(render_text(reports)),
        OutputFormat::Json => serde_json::to_string_pretty(reports).context(SerializeJsonSnafu),
    }
}

/// Describes every comparator of `registry`.
pub fn render_comparators(
    registry: &ComparatorRegistry,
    format: OutputFormat,
) -> Result<String, Error> {
    let descriptions: Vec<_> = registry
        .comparators()
        .map(|comparator| ComparatorDescription {
            name: comparator.name(),
            why_it_matters: comparator.why_it_matters(),
        })
        .collect();

    match format {
        OutputFormat::Text => Ok(descriptions
            .iter()
            .map(|description| format!("{}\n  {}\n", description.name, description.why_it_matters))
            .collect()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&descriptions).context(SerializeJsonSnafu)
        }
    }
}

fn render_text(reports: &[CrdReport]) -> String {
    let mut out = String::new();

    for report in reports {
        let results = report.results.iter().filter(|results| !results.is_empty());

        for results in results {
            out.push_str(&format!("{}: {}\n", report.crd, results.name));
            out.push_str(&format!("  {}\n", results.why_it_matters));

            let findings = results
                .errors
                .iter()
                .map(|error| ("ERROR  ", error))
                .chain(results.warnings.iter().map(|warning| ("WARNING", warning)))
                .chain(results.infos.iter().map(|info| ("INFO   ", info)));
            for (severity, finding) in findings {
                out.push_str(&format!("  {severity} {finding}\n"));
            }
        }
    }

    if out.is_empty() {
        out.push_str("No problems found.\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports() -> Vec<CrdReport> {
        let mut removal = ComparisonResults::new("NoFieldRemoval", "clients break")
            .with_errors(vec!["crd/a version/v1 field/spec.foo may not be removed".to_owned()]);
        removal.infos.push("checked 1 version".to_owned());

        vec![
            CrdReport {
                crd: "a".to_owned(),
                results: vec![removal, ComparisonResults::new("NoBools", "enums grow")],
            },
            CrdReport {
                crd: "b".to_owned(),
                results: vec![ComparisonResults::new("NoBools", "enums grow")],
            },
        ]
    }

    #[test]
    fn renders_text() {
        let text = render(&reports(), OutputFormat::Text).expect("text always renders");

        insta::assert_snapshot!(text, @r"
        a: NoFieldRemoval
          clients break
          ERROR   crd/a version/v1 field/spec.foo may not be removed
          INFO    checked 1 version
        ");
    }

    #[test]
    fn renders_empty_text() {
        let text = render(&[], OutputFormat::Text).expect("text always renders");
        assert_eq!(text, "No problems found.\n");
    }

    #[test]
    fn renders_json() {
        let json = render(&reports(), OutputFormat::Json).expect("reports must serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("output is JSON");

        assert_eq!(value[0]["crd"], "a");
        assert_eq!(value[0]["results"][0]["whyItMatters"], "clients break");
        assert_eq!(value[1]["results"][0]["errors"], serde_json::json!([]));
    }

    #[test]
    fn counts_errors() {
        let reports = reports();
        assert_eq!(reports[0].error_count(), 1);
        assert_eq!(reports[1].error_count(), 0);
    }

    #[test]
    fn lists_comparators() {
        let registry = ComparatorRegistry::builder()
            .with(crd_schema_checker::comparators::NoFieldRemoval)
            .build();

        let text = render_comparators(&registry, OutputFormat::Text).expect("text always renders");
        assert!(text.starts_with("NoFieldRemoval\n  "));
    }
}
