//! Vigil Engine - model-based smart contract vulnerability analysis
//!
//! This crate loads an abstract description of a contract (functions, parameters,
//! guard modifiers and the typed operations each function performs), tracks which
//! values an untrusted caller can steer, and runs a set of independent rules over
//! every operation to produce a deterministic vulnerability report.

pub mod analyzer;
pub mod core;
pub mod model;
pub mod report;
pub mod rules;
pub mod runner;
pub mod signature;
pub mod taint;

pub use analyzer::Analyzer;

pub use core::{
    AnalysisConfig, AnalysisError, AnalysisResult, Diagnostic, Finding, Rule, RuleMatch,
    Severity, SinkSite,
};

pub use model::{ContractModel, DocumentFormat, ModelLoader};

pub use report::{AnalysisReport, OutputFormat, ReportGenerator, ReportSynthesizer};

pub use runner::{RuleEngine, RuleRegistry};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_registration() {
        let registry = RuleRegistry::default();
        assert_eq!(registry.list_ids().len(), 0);
        assert_eq!(RuleRegistry::builtin().len(), 8);
    }
}
