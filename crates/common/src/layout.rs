//! Output directory layout
//!
//! ```text
//! <root>/
//!   screenshots/<device>/staging/<page>.png
//!   screenshots/<device>/prod/<page>.png
//!   screenshots/<device>/diff/<page>.png
//!   visual_comparison_report_<device>.html
//!   visual_comparison_results_<device>.json
//!   functional_checks_<environment>.json
//! ```

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::Result;
use crate::types::{Environment, PageSpec};

/// Paths owned by one device run under an output root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    device: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, device: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            device: device.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn device_dir(&self) -> PathBuf {
        self.root.join("screenshots").join(&self.device)
    }

    pub fn environment_dir(&self, env: Environment) -> PathBuf {
        self.device_dir().join(env.as_str())
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.device_dir().join("diff")
    }

    pub fn screenshot(&self, env: Environment, page: &PageSpec) -> PathBuf {
        self.environment_dir(env).join(format!("{}.png", page.sanitized()))
    }

    pub fn diff(&self, page: &PageSpec) -> PathBuf {
        self.diff_dir().join(format!("{}.png", page.sanitized()))
    }

    pub fn report_html(&self) -> PathBuf {
        self.root.join(format!("visual_comparison_report_{}.html", self.device))
    }

    pub fn results_json(&self) -> PathBuf {
        self.root.join(format!("visual_comparison_results_{}.json", self.device))
    }

    /// Path of `path` relative to the output root, with `/` separators and
    /// each segment percent-encoded, for links inside the HTML report.
    pub fn relative_link(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let Ok(mut link) = Url::parse("file:///") else {
            return segments.join("/");
        };
        if let Ok(mut path_segments) = link.path_segments_mut() {
            path_segments.clear().extend(&segments);
        }
        link.path().trim_start_matches('/').to_string()
    }

    /// Create the staging, prod and diff directories
    pub fn create_dirs(&self) -> Result<()> {
        for env in Environment::ALL {
            std::fs::create_dir_all(self.environment_dir(env))?;
        }
        std::fs::create_dir_all(self.diff_dir())?;
        Ok(())
    }
}

/// Results file for functional checks against one environment
pub fn checks_json(root: &Path, env: Environment) -> PathBuf {
    root.join(format!("functional_checks_{}.json", env))
}
