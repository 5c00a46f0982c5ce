use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{analyze::AnalyzeArgs, batch::BatchArgs, rules::RulesArgs};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Deterministic vulnerability analysis for smart contract models")]
#[command(version)]
struct Cli {
    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one contract model and write its report
    Analyze(AnalyzeArgs),

    /// Analyze every model under a directory
    Batch(BatchArgs),

    /// List the built-in rules
    Rules(RulesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args),
        Commands::Batch(args) => commands::batch::execute(args),
        Commands::Rules(args) => commands::rules::execute(args),
    }
}
