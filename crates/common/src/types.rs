//! Core types for pagediff

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A logical page path shared by both environments, e.g. `/apply/`.
///
/// The path is the pairing key between a staging capture and a prod capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSpec(String);

impl PageSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Flat file stem for this page: every `/` becomes `_`.
    pub fn sanitized(&self) -> String {
        self.0.replace('/', "_")
    }

    /// `base_url` and this path joined without validation
    pub fn join(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Absolute URL of this page under `base_url`.
    pub fn url_on(&self, base_url: &str) -> Result<String> {
        let joined = self.join(base_url);
        url::Url::parse(&joined).map_err(|e| Error::InvalidUrl {
            url: joined.clone(),
            reason: e.to_string(),
        })?;
        Ok(joined)
    }
}

impl std::fmt::Display for PageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageSpec {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Which deployment a capture belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Staging,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Staging, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(Error::InvalidConfig(format!("unknown environment '{}'", other))),
        }
    }
}

/// One deployment of the site under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub base_url: String,

    /// Ordered page paths
    #[serde(default)]
    pub urls: Vec<PageSpec>,
}

/// Browser viewport profile a run is captured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub mobile: bool,
}

impl DeviceProfile {
    pub fn desktop() -> Self {
        Self {
            name: "desktop".to_string(),
            width: 1280,
            height: 800,
            mobile: false,
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({}x{})", self.name, self.width, self.height)
    }
}

/// Outcome of comparing one page across environments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Percentage of matching pixels, 0.0 - 100.0
    Similarity(f64),

    /// Normalized images still differed in size
    SizeMismatch,

    /// Capture or comparison failed; message kept for diagnostics
    Error(String),
}

impl ComparisonOutcome {
    pub fn similarity(&self) -> Option<f64> {
        match self {
            ComparisonOutcome::Similarity(s) => Some(*s),
            _ => None,
        }
    }

    /// Human label used in the report's similarity column
    pub fn label(&self) -> String {
        match self {
            ComparisonOutcome::Similarity(s) => format!("{:.2}%", s),
            ComparisonOutcome::SizeMismatch => "Size mismatch".to_string(),
            ComparisonOutcome::Error(_) => "Error".to_string(),
        }
    }
}

/// Pass/fail classification of a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Error,
}

impl Verdict {
    /// Classify an outcome; the threshold is inclusive on the pass side.
    pub fn classify(outcome: &ComparisonOutcome, pass_threshold: f64) -> Self {
        match outcome {
            ComparisonOutcome::Similarity(s) if *s >= pass_threshold => Verdict::Pass,
            ComparisonOutcome::Similarity(_) => Verdict::Fail,
            ComparisonOutcome::SizeMismatch | ComparisonOutcome::Error(_) => Verdict::Error,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "Pass"),
            Verdict::Fail => write!(f, "Fail"),
            Verdict::Error => write!(f, "Error"),
        }
    }
}

/// Result record for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub page: PageSpec,
    pub staging_url: String,
    pub prod_url: String,
    pub outcome: ComparisonOutcome,
    #[serde(default)]
    pub mismatched_pixels: Option<u64>,
    #[serde(default)]
    pub total_pixels: Option<u64>,
    #[serde(default)]
    pub diff_image: Option<PathBuf>,
    #[serde(default)]
    pub staging_sha256: Option<String>,
    #[serde(default)]
    pub prod_sha256: Option<String>,
    pub duration_ms: u64,
}

impl ComparisonResult {
    /// A result that failed before any score could be computed
    pub fn failed(
        page: PageSpec,
        staging_url: String,
        prod_url: String,
        message: impl Into<String>,
    ) -> Self {
        Self {
            page,
            staging_url,
            prod_url,
            outcome: ComparisonOutcome::Error(message.into()),
            mismatched_pixels: None,
            total_pixels: None,
            diff_image: None,
            staging_sha256: None,
            prod_sha256: None,
            duration_ms: 0,
        }
    }
}

/// Metadata describing one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub device: DeviceProfile,
    pub staging_base_url: String,
    pub prod_base_url: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub pass_threshold: f64,
}

/// Pass/fail/error totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Ordered comparison results for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub results: Vec<ComparisonResult>,
}

impl RunReport {
    pub fn verdict(&self, result: &ComparisonResult) -> Verdict {
        Verdict::classify(&result.outcome, self.metadata.pass_threshold)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.results.len(),
            ..Default::default()
        };
        for result in &self.results {
            match self.verdict(result) {
                Verdict::Pass => summary.passed += 1,
                Verdict::Fail => summary.failed += 1,
                Verdict::Error => summary.errors += 1,
            }
        }
        summary
    }

    /// Load a results file written by a previous run
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
