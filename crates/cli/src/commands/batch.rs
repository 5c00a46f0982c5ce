//! Directory analysis. Each model is loaded and analyzed independently on the
//! rayon pool; the exit status is the worst status of any model. Reports mirror
//! the input tree, so `a/bridge.json` and `b/bridge.json` keep separate reports.

use super::analyze::{print_summary, write_report};
use super::{exit, load_config, ReportFormat, EXIT_CLEAN, EXIT_ERROR, EXIT_FINDINGS};
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::*;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use vigil_engine::{AnalysisConfig, Analyzer, OutputFormat, ReportGenerator, Severity};
use walkdir::WalkDir;

const MODEL_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory searched recursively for models
    #[arg(short, long)]
    pub input: PathBuf,

    /// Reports are written here, mirroring each model's path under `--input`
    #[arg(short, long)]
    pub output_dir: PathBuf,

    #[arg(short = 's', long)]
    pub min_severity: Option<Severity>,

    #[arg(long)]
    pub fail_on: Option<Severity>,

    #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long = "disable", value_name = "RULE")]
    pub disabled_rules: Vec<String>,

    #[arg(short, long)]
    pub quiet: bool,
}

struct BatchOutcome {
    path: PathBuf,
    code: u8,
}

pub fn execute(args: BatchArgs) -> ExitCode {
    match run(&args) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            exit(EXIT_ERROR)
        }
    }
}

fn run(args: &BatchArgs) -> Result<u8> {
    let config = load_config(
        args.config.as_deref(),
        args.min_severity,
        args.fail_on,
        &args.disabled_rules,
    )?;

    let models = find_models(&args.input)?;
    if models.is_empty() {
        eprintln!(
            "{} no models found in {}",
            "warning:".yellow(),
            args.input.display()
        );
        return Ok(EXIT_CLEAN);
    }
    debug!(count = models.len(), "discovered models");

    let format: OutputFormat = args.format.into();
    let jobs = plan_reports(&models, &args.input, &args.output_dir, format)?;
    let analyzer = Analyzer::new(config.clone());

    let outcomes: Vec<BatchOutcome> = jobs
        .par_iter()
        .map(|(path, destination)| {
            analyze_one(&analyzer, &config, path, destination, format, args.quiet)
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.code == EXIT_ERROR).count();
    let flagged = outcomes.iter().filter(|o| o.code == EXIT_FINDINGS).count();

    eprintln!(
        "\n{} {} model(s), {} with findings, {} failed",
        "Batch:".bright_blue().bold(),
        outcomes.len(),
        flagged,
        failed
    );
    for outcome in outcomes.iter().filter(|o| o.code == EXIT_ERROR) {
        eprintln!("   {} {}", "failed:".bright_red(), outcome.path.display());
    }

    Ok(outcomes.iter().map(|o| o.code).max().unwrap_or(EXIT_CLEAN))
}

fn analyze_one(
    analyzer: &Analyzer,
    config: &AnalysisConfig,
    path: &Path,
    destination: &Path,
    format: OutputFormat,
    quiet: bool,
) -> BatchOutcome {
    let code = match analyze_and_write(analyzer, config, path, destination, format, quiet) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            EXIT_ERROR
        }
    };
    BatchOutcome {
        path: path.to_path_buf(),
        code,
    }
}

fn analyze_and_write(
    analyzer: &Analyzer,
    config: &AnalysisConfig,
    path: &Path,
    destination: &Path,
    format: OutputFormat,
    quiet: bool,
) -> Result<u8> {
    let report = analyzer
        .analyze_file(path)
        .with_context(|| format!("Failed to analyze {}", path.display()))?;

    write_report(destination, &ReportGenerator::generate(&report, format)?)?;

    if !quiet {
        print_summary(&report, path, config.fail_on);
    }

    Ok(if report.exceeds(config.fail_on) {
        EXIT_FINDINGS
    } else {
        EXIT_CLEAN
    })
}

/// Report path for every model, mirroring its place under `input`. Two models that
/// would share a report (`a.json` next to `a.yaml`) are rejected up front.
fn plan_reports(
    models: &[PathBuf],
    input: &Path,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut claimed: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    let mut jobs = Vec::with_capacity(models.len());

    for model in models {
        let relative = match model.strip_prefix(input) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => Path::new(model.file_name().unwrap_or(model.as_os_str())),
        };
        let destination = output_dir.join(relative).with_extension(format.extension());

        if let Some(previous) = claimed.insert(destination.clone(), model.as_path()) {
            bail!(
                "{} and {} would both write {}",
                previous.display(),
                model.display(),
                destination.display()
            );
        }
        jobs.push((model.clone(), destination));
    }

    Ok(jobs)
}

fn find_models(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();

        if path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| MODEL_EXTENSIONS.contains(&ext))
        {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_models_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("nested/b.yml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = find_models(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yml"]);
    }

    #[test]
    fn test_reports_mirror_input_tree() {
        let models = vec![
            PathBuf::from("models/bridge.json"),
            PathBuf::from("models/x/bridge.json"),
        ];
        let jobs = plan_reports(
            &models,
            Path::new("models"),
            Path::new("out"),
            OutputFormat::Markdown,
        )
        .unwrap();
        assert_eq!(jobs[0].1, PathBuf::from("out/bridge.md"));
        assert_eq!(jobs[1].1, PathBuf::from("out/x/bridge.md"));
    }

    #[test]
    fn test_colliding_reports_are_rejected() {
        let models = vec![
            PathBuf::from("models/bridge.json"),
            PathBuf::from("models/bridge.yaml"),
        ];
        let err = plan_reports(&models, Path::new("models"), Path::new("out"), OutputFormat::Json)
            .unwrap_err();
        assert!(err.to_string().contains("would both write"));
    }
}
