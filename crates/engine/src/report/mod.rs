//! Report synthesis: turns an engine run into the document callers consume.
//!
//! Ordering is fixed (severity, function name, rule id, operation index) so the same
//! model always renders to the same bytes. Findings under the reporting threshold
//! are counted in the summary instead of being dropped.

pub mod render;

pub use render::{OutputFormat, ReportGenerator};

use crate::core::{Diagnostic, Finding, Severity};
use crate::model::ContractModel;
use crate::runner::RuleRun;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub contract_name: String,
    pub findings: Vec<Finding>,
    pub coverage: Coverage,
    pub summary: Summary,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub functions_analyzed: usize,
    pub functions_total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
    /// Findings below the reporting threshold.
    pub suppressed: usize,
}

impl Summary {
    fn count(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Informational => self.informational += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.informational
    }
}

impl AnalysisReport {
    /// Any reported finding at or above `threshold`.
    pub fn exceeds(&self, threshold: Severity) -> bool {
        self.findings.iter().any(|f| f.severity.is_at_least(threshold))
    }

    pub fn count_at_least(&self, threshold: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity.is_at_least(threshold))
            .count()
    }

    pub fn findings_for<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.rule_id == rule_id)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub struct ReportSynthesizer {
    min_severity: Severity,
}

impl ReportSynthesizer {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    pub fn synthesize(&self, model: &ContractModel, run: RuleRun) -> AnalysisReport {
        let RuleRun {
            mut findings,
            mut diagnostics,
            functions_analyzed,
            ..
        } = run;

        findings.sort_by(|a, b| a.report_order().cmp(&b.report_order()));
        diagnostics.sort_by(|a, b| diagnostic_order(a).cmp(&diagnostic_order(b)));

        let mut summary = Summary::default();
        let mut reported = Vec::with_capacity(findings.len());
        for finding in findings {
            if finding.severity.is_at_least(self.min_severity) {
                summary.count(finding.severity);
                reported.push(finding);
            } else {
                summary.suppressed += 1;
            }
        }

        AnalysisReport {
            contract_name: model.name().to_string(),
            findings: reported,
            coverage: Coverage {
                functions_analyzed,
                functions_total: model.function_count(),
            },
            summary,
            diagnostics,
        }
    }
}

impl Default for ReportSynthesizer {
    fn default() -> Self {
        Self::new(Severity::Informational)
    }
}

fn diagnostic_order(diagnostic: &Diagnostic) -> (&str, usize, &str) {
    match diagnostic {
        Diagnostic::RuleEvaluationSkipped {
            rule_id,
            function_name,
            operation_index,
            ..
        } => (function_name, *operation_index, rule_id),
    }
}
