use super::AnalysisReport;
use crate::core::{Diagnostic, Finding, Severity};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn generate(report: &AnalysisReport, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Self::generate_json(report),
            OutputFormat::Markdown => Ok(Self::generate_markdown(report)),
        }
    }

    fn generate_json(report: &AnalysisReport) -> Result<String> {
        let mut json = serde_json::to_string_pretty(report)
            .context("Failed to serialize report to JSON")?;
        json.push('\n');
        Ok(json)
    }

    fn generate_markdown(report: &AnalysisReport) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Vulnerability Report: {}\n\n", report.contract_name));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **High**: {}\n", report.summary.high));
        md.push_str(&format!("- **Medium**: {}\n", report.summary.medium));
        md.push_str(&format!("- **Low**: {}\n", report.summary.low));
        md.push_str(&format!("- **Informational**: {}\n", report.summary.informational));
        if report.summary.suppressed > 0 {
            md.push_str(&format!(
                "- **Below threshold**: {}\n",
                report.summary.suppressed
            ));
        }
        md.push_str(&format!(
            "\n**Coverage**: {} of {} functions analyzed\n\n",
            report.coverage.functions_analyzed, report.coverage.functions_total
        ));

        if report.findings.is_empty() {
            md.push_str("No findings.\n");
        } else {
            md.push_str("## Findings\n\n");
            Self::append_findings_table(&mut md, &report.findings);
        }

        if !report.diagnostics.is_empty() {
            md.push_str("## Diagnostics\n\n");
            for diagnostic in &report.diagnostics {
                md.push_str(&format!("- {}\n", Self::format_diagnostic(diagnostic)));
            }
            md.push('\n');
        }

        md
    }

    fn append_findings_table(md: &mut String, findings: &[Finding]) {
        md.push_str("| # | Severity | Rule | Function | Operation |\n");
        md.push_str("|---|----------|------|----------|-----------|\n");

        for (idx, finding) in findings.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} {} | `{}` | `{}` | {} |\n",
                idx + 1,
                finding.severity.emoji(),
                finding.severity,
                finding.rule_id,
                finding.function_signature,
                finding.operation_index
            ));
        }
        md.push('\n');

        for (idx, finding) in findings.iter().enumerate() {
            md.push_str(&format!("### {}. {}\n\n", idx + 1, finding.title));
            md.push_str(&format!("{}\n\n", finding.description));

            md.push_str(&format!(
                "**Operation path**: {}\n\n",
                finding
                    .operation_path
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(" → ")
            ));

            if !finding.evidence.is_empty() {
                md.push_str("**Evidence**:\n");
                for line in &finding.evidence {
                    md.push_str(&format!("- {}\n", line));
                }
                md.push('\n');
            }

            md.push_str(&format!("**Suggested fix**: {}\n\n", finding.suggested_fix));
        }
    }

    fn format_diagnostic(diagnostic: &Diagnostic) -> String {
        match diagnostic {
            Diagnostic::RuleEvaluationSkipped {
                rule_id,
                function_name,
                operation_index,
                reason,
            } => format!(
                "`{}` skipped on `{}` operation {}: {}",
                rule_id, function_name, operation_index, reason
            ),
        }
    }

    /// One line per severity with findings, for console summaries.
    pub fn severity_line(report: &AnalysisReport) -> String {
        Severity::ALL
            .iter()
            .map(|s| {
                let count = match s {
                    Severity::High => report.summary.high,
                    Severity::Medium => report.summary.medium,
                    Severity::Low => report.summary.low,
                    Severity::Informational => report.summary.informational,
                };
                format!("{} {}", count, s)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
