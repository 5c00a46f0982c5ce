use crate::core::Severity;
use crate::model::types::modifier_base;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_MAX_OPERATIONS: &str = "VIGIL_MAX_OPERATIONS";
pub const ENV_PARALLEL: &str = "VIGIL_PARALLEL";
pub const ENV_DISABLED_RULES: &str = "VIGIL_DISABLED_RULES";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Upper bound on operations across all functions of one model.
    pub max_operations: usize,

    /// Guards that restrict a function to trusted callers.
    pub privileged_modifiers: Vec<String>,

    pub disabled_rules: Vec<String>,

    pub parallel: bool,

    /// Findings below this level are counted but left out of the report.
    pub min_severity: Severity,

    /// Lowest severity that makes a run fail.
    pub fail_on: Severity,
}

fn default_max_operations() -> usize {
    10_000
}

fn default_privileged_modifiers() -> Vec<String> {
    ["onlyOwner", "onlyAdmin", "onlyRole", "onlyGovernance", "auth"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            privileged_modifiers: default_privileged_modifiers(),
            disabled_rules: Vec::new(),
            parallel: true,
            min_severity: Severity::Informational,
            fail_on: Severity::Low,
        }
    }
}

impl AnalysisConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON config: {}", path.display()))?;
        Ok(config)
    }

    /// Picks the parser from the file extension, defaulting to YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    /// Applies `VIGIL_*` environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_MAX_OPERATIONS) {
            self.max_operations = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", ENV_MAX_OPERATIONS))?;
        }

        if let Some(value) = lookup(ENV_PARALLEL) {
            self.parallel = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(value) = lookup(ENV_DISABLED_RULES) {
            self.disabled_rules = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(self)
    }

    pub fn is_privileged_modifier(&self, modifier: &str) -> bool {
        let base = modifier_base(modifier);
        self.privileged_modifiers
            .iter()
            .any(|m| modifier_base(m) == base)
    }

    pub fn is_rule_disabled(&self, rule_id: &str) -> bool {
        self.disabled_rules.iter().any(|r| r == rule_id)
    }
}

pub const EXAMPLE_CONFIG: &str = r#"
# Vigil analysis configuration

maxOperations: 10000

privilegedModifiers:
  - onlyOwner
  - onlyAdmin
  - onlyRole
  - onlyGovernance
  - auth

disabledRules: []

parallel: true

# informational | low | medium | high
minSeverity: informational
failOn: low
"#;
