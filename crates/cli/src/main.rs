//! pagediff CLI - Main Entry Point
//!
//! Compares a staging deployment against production: visual comparison
//! runs, functional smoke checks, report regeneration and config scaffolding.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{check, compare, init, report};

/// Exit code when every page passed and every check succeeded
const EXIT_OK: u8 = 0;

/// Exit code when any page failed or errored, or any check failed
const EXIT_FAILURES: u8 = 1;

/// Exit code for setup errors (config, browser launch, output directory)
const EXIT_FATAL: u8 = 2;

/// pagediff - staging vs production visual regression
#[derive(Parser)]
#[command(name = "pagediff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "PAGEDIFF_CONFIG", default_value = "pagediff.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture and compare pages on staging and prod
    Compare(compare::CompareArgs),

    /// Run functional checks (broken images, nav links, form flows)
    Check(check::CheckArgs),

    /// Re-render the HTML report from a results file
    Report(report::ReportArgs),

    /// Write a sample configuration
    Init(init::InitArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let result = match cli.command {
        Commands::Compare(args) => compare::execute(args, &cli.config, cli.format).await,
        Commands::Check(args) => check::execute(args, &cli.config, cli.format).await,
        Commands::Report(args) => report::execute(args, cli.format),
        Commands::Init(args) => init::execute(args, &cli.config),
    };

    match result {
        Ok(true) => ExitCode::from(EXIT_OK),
        Ok(false) => ExitCode::from(EXIT_FAILURES),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_FATAL)
        }
    }
}
