//! Rule trait for pluggable vulnerability detection.
//!
//! Each rule is a pure predicate over one operation of one function, evaluated in
//! the taint state that held when the operation ran. Rules share no mutable state,
//! so the engine can evaluate them in any order and on any thread.
//!
//! A rule declares the operation kinds it inspects; the engine only hands it sites
//! of those kinds. Rules about caller-chosen values declare `skips_restricted`,
//! and the engine leaves out functions behind a privileged guard for them.

use crate::core::{SinkSite, Severity};
use crate::model::OperationKind;
use anyhow::Result;

pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn severity(&self) -> Severity;

    /// Suggested fix attached to every finding of this rule.
    fn remediation(&self) -> &'static str;

    fn inspects(&self) -> &'static [OperationKind];

    fn skips_restricted(&self) -> bool {
        false
    }

    /// `Ok(None)` is a clean site. An error means the site had a shape the rule
    /// cannot judge; the engine records it and moves on.
    fn evaluate(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>>;

    fn enabled_by_default(&self) -> bool {
        true
    }
}

/// What a rule reports about one site. The engine adds rule metadata and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub title: String,
    pub description: String,
    pub evidence: Vec<String>,
    /// Operation indices leading to the site, ending with the site itself.
    pub path: Vec<usize>,
}

impl RuleMatch {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            evidence: Vec::new(),
            path: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    pub fn with_path(mut self, path: Vec<usize>) -> Self {
        self.path = path;
        self
    }
}

#[macro_export]
macro_rules! impl_rule {
    (
        $rule:ty,
        id: $id:expr,
        name: $name:expr,
        severity: $severity:expr,
        inspects: [$($kind:expr),+ $(,)?],
        remediation: $remediation:expr
        $(, description: $description:expr)?
        $(, skips_restricted: $skips:expr)?
    ) => {
        impl $crate::core::Rule for $rule {
            fn id(&self) -> &'static str {
                $id
            }

            fn name(&self) -> &'static str {
                $name
            }

            fn severity(&self) -> $crate::core::Severity {
                $severity
            }

            fn remediation(&self) -> &'static str {
                $remediation
            }

            fn inspects(&self) -> &'static [$crate::model::OperationKind] {
                &[$($kind),+]
            }

            $(
                fn description(&self) -> &'static str {
                    $description
                }
            )?

            $(
                fn skips_restricted(&self) -> bool {
                    $skips
                }
            )?

            fn evaluate(
                &self,
                site: &$crate::core::SinkSite<'_>,
            ) -> anyhow::Result<Option<$crate::core::RuleMatch>> {
                self.evaluate_impl(site)
            }
        }
    };
}
