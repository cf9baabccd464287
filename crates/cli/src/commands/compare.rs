//! Compare Command

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use pagediff_common::{ComparisonResult, Environment, RunReport, Verdict};
use pagediff_e2e::{health, report, ChromeDriver, ComparisonRunner};
use serde::Serialize;

use super::{load_config, ConfigOverrides};
use crate::output::{print_info, print_list, print_summary, print_warning, verdict_cell, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Device profile to run; repeat for several (default: all configured)
    #[arg(short, long = "device")]
    pub devices: Vec<String>,

    /// Skip the reachability probe of both environments
    #[arg(long)]
    pub skip_probe: bool,
}

/// One comparison row for display
#[derive(Serialize)]
pub struct ComparisonRow {
    pub device: String,
    pub page: String,
    pub similarity: String,
    pub verdict: Verdict,
    pub duration_ms: u64,
}

impl ComparisonRow {
    fn new(device: &str, report: &RunReport, result: &ComparisonResult) -> Self {
        Self {
            device: device.to_string(),
            page: result.page.to_string(),
            similarity: result.outcome.label(),
            verdict: report.verdict(result),
            duration_ms: result.duration_ms,
        }
    }
}

impl TableDisplay for ComparisonRow {
    fn headers() -> Vec<&'static str> {
        vec!["Device", "Page", "Similarity", "Result", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.device.clone(),
            self.page.clone(),
            self.similarity.clone(),
            verdict_cell(self.verdict),
            format!("{}ms", self.duration_ms),
        ]
    }
}

pub async fn execute(args: CompareArgs, config_path: &Path, format: OutputFormat) -> Result<bool> {
    let config = load_config(config_path, &args.overrides)?;
    let devices = config.select_devices(&args.devices)?;

    if !args.skip_probe {
        for env in Environment::ALL {
            let base_url = &config.environments.get(env).base_url;
            if !health::check_environment(env, base_url).await.is_reachable() {
                print_warning(&format!("{} ({}) is not reachable", env, base_url));
            }
        }
    }

    let run_limit = config.run_timeout_secs.map(Duration::from_secs);
    let mut rows = Vec::new();
    let mut all_passed = true;

    for device in devices {
        let runner = ComparisonRunner::new(&config, device.clone());
        let mut driver = ChromeDriver::launch(&config.browser, &device, config.capture.navigation_timeout())
            .await
            .context("Failed to launch browser")?;

        let outcome = runner.run_bounded(&mut driver, run_limit).await;
        driver.close().await;
        let run = outcome.with_context(|| format!("Comparison run for {} failed", device.name))?;

        let html = report::write_html(&run, runner.layout())?;
        runner.write_results(&run)?;

        let summary = run.summary();
        all_passed &= summary.is_success();
        rows.extend(run.results.iter().map(|r| ComparisonRow::new(&device.name, &run, r)));

        print_summary(&device.label(), &summary);
        print_info(&format!("Report: {}", html.display()));
    }

    print_list(&rows, format);
    Ok(all_passed)
}
