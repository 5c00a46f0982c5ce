use crate::core::{
    AnalysisConfig, DeduplicationStats, Diagnostic, Finding, FindingFingerprint, Rule, SinkSite,
};
use crate::model::ContractModel;
use crate::signature::ContractReplay;
use crate::taint::TaintedModel;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RuleEngine {
    rules: Vec<Arc<dyn Rule>>,
    config: AnalysisConfig,
}

/// Unsorted output of one engine run, in site order.
#[derive(Debug, Default)]
pub struct RuleRun {
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub functions_analyzed: usize,
    pub deduplication_stats: DeduplicationStats,
}

enum Outcome {
    Clean,
    Matched(Finding),
    Skipped(Diagnostic),
}

impl RuleEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            rules: Vec::new(),
            config,
        }
    }

    pub fn add_rule<R: Rule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn with_rules(mut self, rules: Vec<Arc<dyn Rule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn run(
        &self,
        model: &ContractModel,
        tainted: &TaintedModel,
        replay: &ContractReplay,
    ) -> RuleRun {
        let (sites, functions_analyzed) = self.collect_sites(model, tainted, replay);

        let rules: Vec<&Arc<dyn Rule>> = self
            .rules
            .iter()
            .filter(|r| !self.config.is_rule_disabled(r.id()))
            .collect();

        let jobs: Vec<(&Arc<dyn Rule>, &SinkSite<'_>)> = sites
            .iter()
            .flat_map(|site| {
                let kind = site.operation.kind();
                rules
                    .iter()
                    .filter(move |rule| rule.inspects().contains(&kind))
                    .filter(move |rule| !(site.access_restricted && rule.skips_restricted()))
                    .map(move |rule| (*rule, site))
            })
            .collect();

        debug!(
            contract = model.name(),
            sites = sites.len(),
            evaluations = jobs.len(),
            "evaluating rules"
        );

        let outcomes: Vec<Outcome> = if self.config.parallel {
            jobs.par_iter()
                .map(|(rule, site)| Self::evaluate(rule, site))
                .collect()
        } else {
            jobs.iter()
                .map(|(rule, site)| Self::evaluate(rule, site))
                .collect()
        };

        let mut findings = Vec::new();
        let mut diagnostics = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Clean => {}
                Outcome::Matched(finding) => findings.push(finding),
                Outcome::Skipped(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let (findings, deduplication_stats) = Self::deduplicate_findings(findings);
        if deduplication_stats.removed_count > 0 {
            debug!(
                removed = deduplication_stats.removed_count,
                reduction = format!("{:.1}%", deduplication_stats.reduction_percentage()),
                "collapsed duplicate findings"
            );
        }

        RuleRun {
            findings,
            diagnostics,
            functions_analyzed,
            deduplication_stats,
        }
    }

    fn collect_sites<'a>(
        &self,
        model: &'a ContractModel,
        tainted: &'a TaintedModel,
        replay: &'a ContractReplay,
    ) -> (Vec<SinkSite<'a>>, usize) {
        let mut sites = Vec::with_capacity(model.operation_count());
        let mut functions_analyzed = 0;

        for (signature, function) in model.functions() {
            if function.operations.is_empty() {
                continue;
            }
            let Some(function_taint) = tainted.function(signature) else {
                warn!(function = %signature, "no taint state for function, skipping");
                continue;
            };
            functions_analyzed += 1;

            // internal and private functions are only reached through another entry point
            let access_restricted = !function.visibility.is_externally_callable()
                || function
                    .modifiers
                    .iter()
                    .any(|m| self.config.is_privileged_modifier(m));

            for (index, operation) in function.operations.iter().enumerate() {
                let Some(taint) = function_taint.before(index) else {
                    continue;
                };
                sites.push(SinkSite {
                    contract: model,
                    function,
                    signature,
                    index,
                    operation,
                    taint,
                    function_taint,
                    replay: replay.get(signature, index),
                    access_restricted,
                });
            }
        }

        (sites, functions_analyzed)
    }

    fn evaluate(rule: &Arc<dyn Rule>, site: &SinkSite<'_>) -> Outcome {
        match rule.evaluate(site) {
            Ok(Some(m)) => {
                debug!(
                    rule = rule.id(),
                    function = %site.function.name,
                    index = site.index,
                    "rule matched"
                );
                Outcome::Matched(
                    Finding::new(
                        rule.id(),
                        rule.severity(),
                        site.function.name.as_str(),
                        site.signature,
                        site.index,
                    )
                    .with_title(m.title)
                    .with_description(m.description)
                    .with_suggested_fix(rule.remediation())
                    .with_operation_path(m.path)
                    .with_evidence(m.evidence),
                )
            }
            Ok(None) => Outcome::Clean,
            Err(e) => {
                warn!(
                    rule = rule.id(),
                    function = %site.function.name,
                    index = site.index,
                    error = %e,
                    "rule evaluation skipped"
                );
                Outcome::Skipped(Diagnostic::RuleEvaluationSkipped {
                    rule_id: rule.id().to_string(),
                    function_name: site.function.name.clone(),
                    operation_index: site.index,
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    /// Keeps the first finding per fingerprint.
    fn deduplicate_findings(findings: Vec<Finding>) -> (Vec<Finding>, DeduplicationStats) {
        let original_count = findings.len();
        let mut seen = HashSet::new();
        let deduped: Vec<Finding> = findings
            .into_iter()
            .filter(|f| seen.insert(FindingFingerprint::from_finding(f)))
            .collect();

        let stats = DeduplicationStats {
            original_count,
            deduped_count: deduped.len(),
            removed_count: original_count - deduped.len(),
        };
        (deduped, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RuleMatch, Severity};
    use crate::model::{DocumentFormat, ModelLoader, OperationKind};
    use crate::signature::SignatureAnalyzer;
    use crate::taint::TaintTracker;
    use anyhow::{bail, Result};

    struct AlwaysMatch;

    impl AlwaysMatch {
        fn evaluate_impl(&self, _site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
            Ok(Some(RuleMatch::new("match", "always")))
        }
    }

    crate::impl_rule!(
        AlwaysMatch,
        id: "always",
        name: "Always",
        severity: Severity::Low,
        inspects: [OperationKind::ExternalCall],
        remediation: "none",
        skips_restricted: true
    );

    struct Exploding;

    impl Exploding {
        fn evaluate_impl(&self, site: &SinkSite<'_>) -> Result<Option<RuleMatch>> {
            bail!("cannot judge {}", site.operation.kind())
        }
    }

    crate::impl_rule!(
        Exploding,
        id: "exploding",
        name: "Exploding",
        severity: Severity::High,
        inspects: [OperationKind::ExternalCall],
        remediation: "none"
    );

    const MODEL: &str = r#"{
        "contractName": "Router",
        "functions": [
            {
                "name": "a",
                "parameters": [{"name": "t", "type": "address", "callerSupplied": true}],
                "operations": [
                    {"kind": "externalCall", "operands": ["t"]},
                    {"kind": "externalCall", "operands": ["t"]}
                ]
            },
            {
                "name": "b",
                "modifiers": ["onlyOwner"],
                "parameters": [{"name": "t", "type": "address", "callerSupplied": true}],
                "operations": [{"kind": "externalCall", "operands": ["t"]}]
            },
            {"name": "c", "mutability": "view"},
            {
                "name": "d",
                "visibility": "internal",
                "parameters": [{"name": "t", "type": "address", "callerSupplied": true}],
                "operations": [{"kind": "externalCall", "operands": ["t"]}]
            }
        ]
    }"#;

    fn run(engine: RuleEngine) -> RuleRun {
        let model = ModelLoader::new(100).load_str(MODEL, DocumentFormat::Json).unwrap();
        let tainted = TaintTracker::track(&model);
        let replay = SignatureAnalyzer::assess_contract(&model, &tainted);
        engine.run(&model, &tainted, &replay)
    }

    #[test]
    fn test_restricted_functions_skipped_for_caller_rules() {
        let result = run(RuleEngine::new(AnalysisConfig::default()).add_rule(AlwaysMatch));
        assert_eq!(result.findings.len(), 2);
        assert!(result.findings.iter().all(|f| f.function_name == "a"));
        assert_eq!(result.functions_analyzed, 3);
    }

    #[test]
    fn test_internal_functions_skipped_for_caller_rules() {
        let result = run(RuleEngine::new(AnalysisConfig::default()).add_rule(Exploding));
        assert!(result.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::RuleEvaluationSkipped { function_name, .. } if function_name == "d"
        )));

        let result = run(RuleEngine::new(AnalysisConfig::default()).add_rule(AlwaysMatch));
        assert!(!result.findings.iter().any(|f| f.function_name == "d"));
    }

    #[test]
    fn test_failing_rule_becomes_diagnostic() {
        let result = run(
            RuleEngine::new(AnalysisConfig::default())
                .add_rule(Exploding)
                .add_rule(AlwaysMatch),
        );
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.diagnostics.len(), 4);
        assert!(result.diagnostics.iter().all(|d| d.rule_id() == "exploding"));
    }

    #[test]
    fn test_duplicate_rules_are_deduplicated() {
        let result = run(
            RuleEngine::new(AnalysisConfig::default())
                .add_rule(AlwaysMatch)
                .add_rule(AlwaysMatch),
        );
        assert_eq!(result.findings.len(), 2);
        let stats = result.deduplication_stats;
        assert_eq!(stats.original_count, 4);
        assert_eq!(stats.removed_count, 2);
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let parallel = run(
            RuleEngine::new(AnalysisConfig::default()).with_rules(crate::rules::builtin_rules()),
        );
        let sequential = run(
            RuleEngine::new(AnalysisConfig {
                parallel: false,
                ..AnalysisConfig::default()
            })
            .with_rules(crate::rules::builtin_rules()),
        );
        assert_eq!(parallel.findings, sequential.findings);
    }

    #[test]
    fn test_disabled_rule_not_evaluated() {
        let config = AnalysisConfig {
            disabled_rules: vec!["exploding".to_string()],
            ..AnalysisConfig::default()
        };
        let result = run(RuleEngine::new(config).add_rule(Exploding));
        assert!(result.diagnostics.is_empty());
    }
}
