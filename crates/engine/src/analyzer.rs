//! End-to-end pipeline: load, track taint, assess signatures, run rules, report.

use crate::core::{AnalysisConfig, AnalysisResult};
use crate::model::{ContractModel, DocumentFormat, ModelLoader};
use crate::report::{AnalysisReport, ReportSynthesizer};
use crate::runner::{RuleEngine, RuleRegistry};
use crate::signature::SignatureAnalyzer;
use crate::taint::TaintTracker;
use std::path::Path;
use tracing::info;

pub struct Analyzer {
    config: AnalysisConfig,
    registry: RuleRegistry,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            registry: RuleRegistry::builtin(),
        }
    }

    pub fn analyze_file(&self, path: impl AsRef<Path>) -> AnalysisResult<AnalysisReport> {
        let model = ModelLoader::from_config(&self.config).load_file(path.as_ref())?;
        Ok(self.analyze_model(&model))
    }

    pub fn analyze_str(&self, text: &str, format: DocumentFormat) -> AnalysisResult<AnalysisReport> {
        let model = ModelLoader::from_config(&self.config).load_str(text, format)?;
        Ok(self.analyze_model(&model))
    }

    /// Runs every enabled rule over an already loaded model.
    pub fn analyze_model(&self, model: &ContractModel) -> AnalysisReport {
        let tainted = TaintTracker::track(model);
        let replay = SignatureAnalyzer::assess_contract(model, &tainted);

        let engine = RuleEngine::new(self.config.clone())
            .with_rules(self.registry.enabled(&self.config));
        let run = engine.run(model, &tainted, &replay);
        let run_duplicates = run.deduplication_stats.removed_count;

        let report = ReportSynthesizer::new(self.config.min_severity).synthesize(model, run);

        info!(
            contract = %report.contract_name,
            findings = report.findings.len(),
            suppressed = report.summary.suppressed,
            diagnostics = report.diagnostics.len(),
            duplicates = run_duplicates,
            signature_checks = replay.len(),
            "analysis complete"
        );

        report
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
