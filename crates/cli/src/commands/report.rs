//! Report Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pagediff_common::{OutputLayout, RunReport};
use pagediff_e2e::report::write_html;
use serde::Serialize;

use crate::output::{print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ReportArgs {
    /// Results file written by `pagediff compare`
    #[arg(short, long)]
    pub results: PathBuf,
}

/// Run totals display wrapper
#[derive(Serialize)]
pub struct SummaryRow {
    pub device: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl TableDisplay for SummaryRow {
    fn headers() -> Vec<&'static str> {
        vec!["Device", "Total", "Pass", "Fail", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.device.clone(),
            self.total.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
            self.errors.to_string(),
        ]
    }
}

/// Re-render the HTML next to the results file; screenshots are linked
/// relative to that directory.
pub fn execute(args: ReportArgs, format: OutputFormat) -> Result<bool> {
    let run = RunReport::load(&args.results)
        .with_context(|| format!("Failed to read results from {}", args.results.display()))?;

    let root = args
        .results
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let layout = OutputLayout::new(root, run.metadata.device.name.as_str());
    let path = write_html(&run, &layout)?;

    let summary = run.summary();
    print_list(
        &[SummaryRow {
            device: run.metadata.device.name.clone(),
            total: summary.total,
            passed: summary.passed,
            failed: summary.failed,
            errors: summary.errors,
        }],
        format,
    );
    print_success(&format!("Report written to {}", path.display()));

    Ok(true)
}
