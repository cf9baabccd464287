//! CLI Commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use pagediff_common::RunConfig;
use tracing::debug;

pub mod check;
pub mod compare;
pub mod init;
pub mod report;

/// Flags that override values from the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Output root for screenshots and reports
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Staging base URL
    #[arg(long, env = "PAGEDIFF_STAGING_URL")]
    pub staging_url: Option<String>,

    /// Production base URL
    #[arg(long, env = "PAGEDIFF_PROD_URL")]
    pub prod_url: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(url) = &self.staging_url {
            config.environments.staging.base_url = url.clone();
        }
        if let Some(url) = &self.prod_url {
            config.environments.prod.base_url = url.clone();
        }
    }
}

/// Load the config file, apply CLI overrides and validate the result
pub fn load_config(path: &Path, overrides: &ConfigOverrides) -> Result<RunConfig> {
    let mut config = RunConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration after overrides")?;
    debug!(
        "Loaded {} ({} device(s), {} page(s))",
        path.display(),
        config.devices.len(),
        config.environments.staging.urls.len()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagediff.toml");
        RunConfig::sample().save(&path).unwrap();

        let overrides = ConfigOverrides {
            output: Some(dir.path().join("out")),
            staging_url: Some("http://localhost:8080".to_string()),
            prod_url: None,
        };
        let config = load_config(&path, &overrides).unwrap();

        assert_eq!(config.output_dir, dir.path().join("out"));
        assert_eq!(config.environments.staging.base_url, "http://localhost:8080");
        assert_eq!(config.environments.prod.base_url, "https://www.example.com");
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagediff.toml");
        RunConfig::sample().save(&path).unwrap();

        let overrides = ConfigOverrides {
            prod_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(load_config(&path, &overrides).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Path::new("/nonexistent/pagediff.toml"), &ConfigOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
