//! Error types for the comparison engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Capture failed for {url}: {reason}")]
    CaptureFailed { url: String, reason: String },

    #[error("Flow spec parse error: {0}")]
    SpecParse(String),

    #[error("Flow step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Expectation not met: {0}")]
    AssertionFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Run timed out after {0}s")]
    RunTimeout(u64),

    #[error(transparent)]
    Common(#[from] pagediff_common::Error),

    #[error("File I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid flow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),
}

impl From<chromiumoxide::error::CdpError> for E2eError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        E2eError::Browser(e.to_string())
    }
}

/// Result alias for the comparison engine
pub type E2eResult<T> = std::result::Result<T, E2eError>;
