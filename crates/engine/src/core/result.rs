use crate::core::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,

    pub severity: Severity,

    pub function_name: String,

    /// Disambiguates overloads; `functionName` alone may not.
    pub function_signature: String,

    pub operation_index: usize,

    pub title: String,

    pub description: String,

    pub suggested_fix: String,

    pub operation_path: Vec<usize>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub evidence: Vec<String>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        function_name: impl Into<String>,
        function_signature: impl Into<String>,
        operation_index: usize,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            function_name: function_name.into(),
            function_signature: function_signature.into(),
            operation_index,
            title: String::new(),
            description: String::new(),
            suggested_fix: String::new(),
            operation_path: vec![operation_index],
            evidence: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = fix.into();
        self
    }

    /// Ignored when empty; the path always ends at the finding's operation.
    pub fn with_operation_path(mut self, path: Vec<usize>) -> Self {
        if !path.is_empty() {
            self.operation_path = path;
        }
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Report order: severity, then function name, rule id, operation index.
    pub fn report_order(&self) -> (u8, &str, &str, usize, &str) {
        (
            self.severity.report_rank(),
            &self.function_name,
            &self.rule_id,
            self.operation_index,
            &self.function_signature,
        )
    }
}

/// Non-fatal problems recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
    #[serde(rename_all = "camelCase")]
    RuleEvaluationSkipped {
        rule_id: String,
        function_name: String,
        operation_index: usize,
        reason: String,
    },
}

impl Diagnostic {
    pub fn rule_id(&self) -> &str {
        match self {
            Self::RuleEvaluationSkipped { rule_id, .. } => rule_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_serializes_camel_case() {
        let finding = Finding::new("unrestricted-source", Severity::High, "deposit", "deposit(address)", 2)
            .with_title("t")
            .with_description("d")
            .with_suggested_fix("f");
        let json = serde_json::to_value(&finding).unwrap();

        assert_eq!(json["ruleId"], "unrestricted-source");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["operationIndex"], 2);
        assert_eq!(json["suggestedFix"], "f");
        assert_eq!(json["operationPath"], serde_json::json!([2]));
        assert!(json.get("evidence").is_none());
    }

    #[test]
    fn test_empty_path_keeps_site() {
        let finding = Finding::new("r", Severity::Low, "f", "f()", 4).with_operation_path(Vec::new());
        assert_eq!(finding.operation_path, vec![4]);
    }

    #[test]
    fn test_diagnostic_is_tagged() {
        let diagnostic = Diagnostic::RuleEvaluationSkipped {
            rule_id: "r".to_string(),
            function_name: "f".to_string(),
            operation_index: 0,
            reason: "boom".to_string(),
        };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "RuleEvaluationSkipped");
        assert_eq!(json["ruleId"], "r");
        assert_eq!(json["operationIndex"], 0);
    }
}
