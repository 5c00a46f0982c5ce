//! Subcommands of the `vigil` binary.
//!
//! `analyze` handles a single model and is what CI gates call. `batch` walks a
//! directory of models, and `rules` prints the rule catalogue.

pub mod analyze;
pub mod batch;
pub mod rules;

use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;
use std::process::ExitCode;
use vigil_engine::{AnalysisConfig, OutputFormat, Severity};

/// No finding at or above the failure threshold.
pub const EXIT_CLEAN: u8 = 0;
/// At least one finding at or above the failure threshold.
pub const EXIT_FINDINGS: u8 = 1;
/// Input or environment error; no report was produced.
pub const EXIT_ERROR: u8 = 2;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl From<ReportFormat> for OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Json => OutputFormat::Json,
            ReportFormat::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Config file, then `VIGIL_*` environment, then command line flags.
pub fn load_config(
    path: Option<&Path>,
    min_severity: Option<Severity>,
    fail_on: Option<Severity>,
    disabled: &[String],
) -> Result<AnalysisConfig> {
    let base = match path {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let mut config = base.with_env_overrides()?;

    if let Some(level) = min_severity {
        config.min_severity = level;
    }
    if let Some(level) = fail_on {
        config.fail_on = level;
    }
    config.disabled_rules.extend(disabled.iter().cloned());

    Ok(config)
}

pub fn exit(code: u8) -> ExitCode {
    ExitCode::from(code)
}
