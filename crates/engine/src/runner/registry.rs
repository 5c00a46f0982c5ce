use crate::core::{AnalysisConfig, Rule, Severity};
use crate::model::OperationKind;
use crate::rules::builtin_rules;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rules keyed by id. Iteration is in id order.
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for rule in builtin_rules() {
            registry.register_arc(rule);
        }
        registry
    }

    pub fn register_arc(&mut self, rule: Arc<dyn Rule>) {
        let id = rule.id().to_string();
        self.rules.insert(id, rule);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Rule>> {
        self.rules.get(id).cloned()
    }

    /// Rules on by default and not disabled in `config`.
    pub fn enabled(&self, config: &AnalysisConfig) -> Vec<Arc<dyn Rule>> {
        self.rules
            .values()
            .filter(|r| r.enabled_by_default() && !config.is_rule_disabled(r.id()))
            .cloned()
            .collect()
    }

    pub fn list(&self) -> Vec<RuleInfo> {
        self.rules.values().map(|r| RuleInfo::from_rule(r.as_ref())).collect()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub inspects: Vec<OperationKind>,
    pub skips_restricted: bool,
}

impl RuleInfo {
    fn from_rule(rule: &dyn Rule) -> Self {
        Self {
            id: rule.id().to_string(),
            name: rule.name().to_string(),
            description: rule.description().to_string(),
            severity: rule.severity(),
            inspects: rule.inspects().to_vec(),
            skips_restricted: rule.skips_restricted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_by_default() {
        assert!(RuleRegistry::default().is_empty());
    }

    #[test]
    fn test_builtin_lists_in_id_order() {
        let registry = RuleRegistry::builtin();
        let ids = registry.list_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(registry.get("missing-replay-nonce").is_some());
        let medium = registry
            .list()
            .into_iter()
            .filter(|r| r.severity == Severity::Medium)
            .count();
        assert_eq!(medium, 2);
    }

    #[test]
    fn test_enabled_honours_disabled_rules() {
        let registry = RuleRegistry::builtin();
        let config = AnalysisConfig {
            disabled_rules: vec!["unbounded-return-data".to_string()],
            ..AnalysisConfig::default()
        };
        let enabled = registry.enabled(&config);
        assert_eq!(enabled.len(), registry.len() - 1);
        assert!(enabled.iter().all(|r| r.id() != "unbounded-return-data"));
    }
}
