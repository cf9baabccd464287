//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{DeviceProfile, Environment, EnvironmentConfig, PageSpec};

/// Default similarity (percent) at or above which a page passes
pub const DEFAULT_PASS_THRESHOLD: f64 = 95.0;

/// Default per-pixel perceptual difference threshold (0.0 - 1.0)
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 0.1;

/// Top-level configuration for a pagediff run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Root directory for screenshots and reports
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Outer bound on a whole device run
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Canonical frame every screenshot is normalized to
    #[serde(default)]
    pub frame: FrameConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceProfile>,

    pub environments: Environments,

    #[serde(default)]
    pub checks: ChecksConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_devices() -> Vec<DeviceProfile> {
    vec![DeviceProfile::desktop()]
}

/// The two deployments being compared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environments {
    pub staging: EnvironmentConfig,
    pub prod: EnvironmentConfig,
}

impl Environments {
    pub fn get(&self, env: Environment) -> &EnvironmentConfig {
        match env {
            Environment::Staging => &self.staging,
            Environment::Prod => &self.prod,
        }
    }
}

/// Pass/fail and pixel thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Similarity percent at or above which a page passes
    pub pass_percent: f64,

    /// Perceptual color difference above which a pixel mismatches
    pub pixel: f64,

    /// Count anti-aliased pixels as mismatches
    #[serde(default)]
    pub include_antialiasing: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            pass_percent: DEFAULT_PASS_THRESHOLD,
            pixel: DEFAULT_PIXEL_THRESHOLD,
            include_antialiasing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Navigation bounds for a single capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Upper bound on navigation settling
    pub navigation_timeout_secs: u64,

    /// Capture whatever is rendered after this long
    pub forced_capture_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 60,
            forced_capture_secs: 10,
        }
    }
}

impl CaptureConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn forced_capture(&self) -> Duration {
        Duration::from_secs(self.forced_capture_secs)
    }
}

/// Chromium launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Chromium binary; auto-detected when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Extra command-line switches
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            args: Vec::new(),
        }
    }
}

/// Functional smoke-check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Pages scanned for broken images
    #[serde(default = "default_image_pages")]
    pub image_pages: Vec<PageSpec>,

    /// Page whose navigation menu is validated
    #[serde(default = "default_nav_page")]
    pub nav_page: PageSpec,

    #[serde(default = "default_nav_selector")]
    pub nav_selector: String,

    /// Directory of YAML form-flow specs
    #[serde(default)]
    pub flows_dir: Option<PathBuf>,

    #[serde(default = "default_link_timeout")]
    pub link_timeout_secs: u64,
}

fn default_image_pages() -> Vec<PageSpec> {
    vec![PageSpec::new("/")]
}

fn default_nav_page() -> PageSpec {
    PageSpec::new("/")
}

fn default_nav_selector() -> String {
    "nav a[href]".to_string()
}

fn default_link_timeout() -> u64 {
    15
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            image_pages: default_image_pages(),
            nav_page: default_nav_page(),
            nav_selector: default_nav_selector(),
            flows_dir: None,
            link_timeout_secs: default_link_timeout(),
        }
    }
}

impl RunConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check invariants a run depends on
    pub fn validate(&self) -> Result<()> {
        for env in Environment::ALL {
            let cfg = self.environments.get(env);
            let parsed = url::Url::parse(&cfg.base_url).map_err(|e| Error::InvalidUrl {
                url: cfg.base_url.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::InvalidConfig(format!(
                    "{} base_url must be http(s): {}",
                    env, cfg.base_url
                )));
            }
            if let Some(page) = cfg.urls.iter().find(|p| !p.path().starts_with('/')) {
                return Err(Error::InvalidConfig(format!(
                    "{} page path must start with '/': {}",
                    env, page
                )));
            }
        }

        if self.environments.staging.urls.is_empty() {
            return Err(Error::InvalidConfig("staging has no pages configured".to_string()));
        }

        for page in &self.environments.staging.urls {
            if !self.environments.prod.urls.contains(page) {
                warn!("Page {} is not listed for prod; comparing against prod base URL anyway", page);
            }
        }

        if self.devices.is_empty() {
            return Err(Error::InvalidConfig("at least one device is required".to_string()));
        }
        if let Some(d) = self.devices.iter().find(|d| d.width == 0 || d.height == 0) {
            return Err(Error::InvalidConfig(format!("device '{}' has a zero dimension", d.name)));
        }
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(Error::InvalidConfig("frame dimensions must be non-zero".to_string()));
        }
        if !(0.0..=100.0).contains(&self.thresholds.pass_percent) {
            return Err(Error::InvalidConfig(format!(
                "pass_percent must be within 0-100, got {}",
                self.thresholds.pass_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.thresholds.pixel) {
            return Err(Error::InvalidConfig(format!(
                "pixel threshold must be within 0-1, got {}",
                self.thresholds.pixel
            )));
        }
        if self.capture.forced_capture_secs == 0 || self.capture.navigation_timeout_secs == 0 {
            return Err(Error::InvalidConfig("capture timeouts must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Select device profiles by name; empty selection means all
    pub fn select_devices(&self, names: &[String]) -> Result<Vec<DeviceProfile>> {
        if names.is_empty() {
            return Ok(self.devices.clone());
        }
        names
            .iter()
            .map(|name| {
                self.devices
                    .iter()
                    .find(|d| &d.name == name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownDevice(name.clone()))
            })
            .collect()
    }

    /// Sample configuration written by `pagediff init`
    pub fn sample() -> Self {
        Self {
            output_dir: default_output_dir(),
            run_timeout_secs: Some(1800),
            thresholds: ThresholdConfig::default(),
            frame: FrameConfig::default(),
            capture: CaptureConfig::default(),
            browser: BrowserConfig::default(),
            devices: vec![
                DeviceProfile::desktop(),
                DeviceProfile {
                    name: "mobile".to_string(),
                    width: 375,
                    height: 667,
                    mobile: true,
                },
            ],
            environments: Environments {
                staging: EnvironmentConfig {
                    base_url: "https://staging.example.com".to_string(),
                    urls: vec![PageSpec::new("/"), PageSpec::new("/apply/")],
                },
                prod: EnvironmentConfig {
                    base_url: "https://www.example.com".to_string(),
                    urls: vec![PageSpec::new("/"), PageSpec::new("/apply/")],
                },
            },
            checks: ChecksConfig {
                flows_dir: Some(PathBuf::from("flows")),
                ..Default::default()
            },
        }
    }
}
