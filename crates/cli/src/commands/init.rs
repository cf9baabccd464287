//! Init Command

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use pagediff_common::RunConfig;

use crate::output::{print_info, print_success};

/// Example flow written next to a fresh config
const SAMPLE_FLOW: &str = r#"name: apply-form
description: Fill in and submit the application form
steps:
  - action: navigate
    url: /apply/
  - action: fill
    selector: '#email'
    value: qa@example.com
  - action: check
    selector: '#terms'
  - action: click
    selector: 'button[type="submit"]'
  - action: wait
    selector: '.confirmation'
    timeout_ms: 10000
  - action: assert
    selector: '.confirmation'
    text_contains: Thank you
  - action: screenshot
    name: submitted
"#;

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitArgs, config_path: &Path) -> Result<bool> {
    if config_path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    let config = RunConfig::sample();
    config
        .save(config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    print_success(&format!("Wrote {}", config_path.display()));

    if let Some(flows_dir) = &config.checks.flows_dir {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let flow_path = base.join(flows_dir).join("apply.yaml");
        if !flow_path.exists() || args.force {
            std::fs::create_dir_all(base.join(flows_dir))?;
            std::fs::write(&flow_path, SAMPLE_FLOW)?;
            print_success(&format!("Wrote {}", flow_path.display()));
        }
    }

    print_info("Edit the base URLs and page lists, then run `pagediff compare`");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagediff_e2e::FlowSpec;

    #[test]
    fn test_init_writes_loadable_config_and_flow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagediff.toml");

        assert!(execute(InitArgs { force: false }, &path).unwrap());

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.devices.len(), 2);
        let flow = FlowSpec::from_file(&dir.path().join("flows/apply.yaml")).unwrap();
        assert_eq!(flow.name, "apply-form");
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagediff.toml");
        std::fs::write(&path, "keep me").unwrap();

        assert!(execute(InitArgs { force: false }, &path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }
}
