use super::{exit, EXIT_CLEAN, EXIT_ERROR};
use anyhow::Result;
use clap::Args;
use colored::*;
use std::process::ExitCode;
use vigil_engine::RuleRegistry;

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Print the catalogue as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: RulesArgs) -> ExitCode {
    match run(&args) {
        Ok(()) => exit(EXIT_CLEAN),
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            exit(EXIT_ERROR)
        }
    }
}

fn run(args: &RulesArgs) -> Result<()> {
    let rules = RuleRegistry::builtin().list();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    println!("{}", "Built-in rules".bright_blue().bold());
    println!("{}", "=".repeat(50).bright_blue());
    for rule in &rules {
        println!(
            "\n{} {} {}",
            rule.severity.emoji(),
            rule.id.bold(),
            format!("({})", rule.severity).color(rule.severity.color())
        );
        println!("   {}", rule.name);
        println!("   {}", rule.description);
        let kinds: Vec<String> = rule.inspects.iter().map(|k| k.to_string()).collect();
        println!("   Inspects: {}", kinds.join(", "));
        if rule.skips_restricted {
            println!("   Skipped in functions behind privileged modifiers");
        }
    }

    Ok(())
}
