//! Check Command

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use pagediff_common::Environment;
use pagediff_e2e::checks::write_check_results;
use pagediff_e2e::{CheckResult, ChromeDriver, FunctionalChecks};
use serde::Serialize;

use super::{load_config, ConfigOverrides};
use crate::output::{passed_cell, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Environment to check; repeat for both (default: staging and prod)
    #[arg(short, long = "env")]
    pub environments: Vec<Environment>,

    /// Device profile whose viewport the checks run in (default: first configured)
    #[arg(short, long)]
    pub device: Option<String>,
}

/// Check result display wrapper
#[derive(Serialize)]
pub struct CheckRow<'a> {
    #[serde(flatten)]
    pub result: &'a CheckResult,
}

impl TableDisplay for CheckRow<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Environment", "Check", "Passed", "Details", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let r = self.result;
        vec![
            r.environment.to_string(),
            r.name.clone(),
            passed_cell(r.passed),
            r.details.join("\n"),
            format!("{}ms", r.duration_ms),
        ]
    }
}

pub async fn execute(args: CheckArgs, config_path: &Path, format: OutputFormat) -> Result<bool> {
    let config = load_config(config_path, &args.overrides)?;

    let device = match &args.device {
        Some(name) => config.select_devices(std::slice::from_ref(name))?.remove(0),
        None => config
            .devices
            .first()
            .cloned()
            .context("No device profiles configured")?,
    };

    let environments = if args.environments.is_empty() {
        Environment::ALL.to_vec()
    } else {
        args.environments.clone()
    };

    let mut driver = ChromeDriver::launch(&config.browser, &device, config.capture.navigation_timeout())
        .await
        .context("Failed to launch browser")?;

    let mut results = Vec::new();
    for env in environments {
        let checks = match FunctionalChecks::new(&config, env) {
            Ok(checks) => checks,
            Err(e) => {
                driver.close().await;
                return Err(e).context("Failed to prepare functional checks");
            }
        };
        let env_results = checks.run_all(&mut driver).await;
        write_check_results(&config.output_dir, env, &env_results)?;
        results.extend(env_results);
    }
    driver.close().await;

    let failed = results.iter().filter(|r| !r.passed).count();
    let rows: Vec<_> = results.iter().map(|result| CheckRow { result }).collect();
    print_list(&rows, format);

    if failed == 0 {
        print_success(&format!("All {} checks passed", results.len()));
    } else {
        print_warning(&format!("{} of {} checks failed", failed, results.len()));
    }

    Ok(failed == 0)
}
