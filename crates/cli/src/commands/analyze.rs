//! Single-model analysis.
//!
//! The report goes to `--output` when given, otherwise to stdout. The console
//! summary always goes to stderr so a piped report stays parseable.

use super::{exit, load_config, ReportFormat, EXIT_CLEAN, EXIT_ERROR, EXIT_FINDINGS};
use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use vigil_engine::{AnalysisReport, Analyzer, ReportGenerator, Severity};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Contract model (JSON or YAML)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Report destination; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Findings below this level are counted but not listed
    #[arg(short = 's', long)]
    pub min_severity: Option<Severity>,

    /// Lowest severity that makes the run exit with status 1
    #[arg(long)]
    pub fail_on: Option<Severity>,

    #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    /// Analysis config file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rule ids to skip; repeatable
    #[arg(long = "disable", value_name = "RULE")]
    pub disabled_rules: Vec<String>,

    /// Skip the console summary
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn execute(args: AnalyzeArgs) -> ExitCode {
    match run(&args) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            exit(EXIT_ERROR)
        }
    }
}

fn run(args: &AnalyzeArgs) -> Result<u8> {
    let config = load_config(
        args.config.as_deref(),
        args.min_severity,
        args.fail_on,
        &args.disabled_rules,
    )?;
    let fail_on = config.fail_on;

    let start = Instant::now();
    let report = Analyzer::new(config)
        .analyze_file(&args.input)
        .with_context(|| format!("Failed to analyze {}", args.input.display()))?;
    let elapsed = start.elapsed();

    let rendered = ReportGenerator::generate(&report, args.format.into())?;
    match &args.output {
        Some(path) => write_report(path, &rendered)?,
        None => print!("{}", rendered),
    }

    if !args.quiet {
        print_summary(&report, &args.input, fail_on);
        eprintln!("   Time: {:.3}s", elapsed.as_secs_f64());
        if let Some(path) = &args.output {
            eprintln!("   Report: {}", path.display());
        }
    }

    Ok(if report.exceeds(fail_on) {
        EXIT_FINDINGS
    } else {
        EXIT_CLEAN
    })
}

pub(crate) fn write_report(path: &Path, rendered: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, rendered)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

pub(crate) fn print_summary(report: &AnalysisReport, input: &Path, fail_on: Severity) {
    eprintln!(
        "\n{} {} ({})",
        "Vigil:".bright_blue().bold(),
        report.contract_name.bold(),
        input.display()
    );
    eprintln!(
        "   Functions: {} of {} analyzed",
        report.coverage.functions_analyzed, report.coverage.functions_total
    );

    if report.is_clean() {
        eprintln!("   {}", "No findings".bright_green());
    } else {
        eprintln!("   {}", ReportGenerator::severity_line(report));
        for finding in &report.findings {
            eprintln!(
                "   {} {} {} in {} (op {})",
                finding.severity.emoji(),
                colorize(finding.severity),
                finding.rule_id,
                finding.function_signature,
                finding.operation_index
            );
        }
    }

    if report.summary.suppressed > 0 {
        eprintln!(
            "   {} finding(s) below the reporting threshold",
            report.summary.suppressed
        );
    }
    for diagnostic in &report.diagnostics {
        eprintln!(
            "   {} rule {} was skipped",
            "warning:".yellow(),
            diagnostic.rule_id()
        );
    }

    let failing = report.count_at_least(fail_on);
    if failing > 0 {
        eprintln!(
            "   {}",
            format!("{} finding(s) at or above {}", failing, fail_on)
                .bright_red()
                .bold()
        );
    }
}

fn colorize(severity: Severity) -> ColoredString {
    let label = severity.to_string();
    label.color(severity.color()).bold()
}
