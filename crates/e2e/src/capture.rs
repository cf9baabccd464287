//! Screenshot capture with a bounded navigation wait
//!
//! The page is reset to a blank document first, then navigation is raced
//! against a forced-capture timer. Whichever finishes first, a screenshot is
//! taken of whatever the page currently shows, and a file is always left at
//! the destination. A page still on the blank document never rendered the
//! target and yields a placeholder.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use pagediff_common::config::CaptureConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::browser::{PageDriver, BLANK_PAGE};
use crate::error::{E2eError, E2eResult};
use crate::normalize::encode_png;

/// Bounds for one navigation
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimeouts {
    /// Upper bound on the navigation settling
    pub navigation: Duration,

    /// Capture proceeds after this long regardless of navigation state
    pub forced_capture: Duration,
}

impl Default for CaptureTimeouts {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureTimeouts {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            navigation: config.navigation_timeout(),
            forced_capture: config.forced_capture(),
        }
    }
}

/// How the navigation wait ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The page loaded and went quiet
    Settled,

    /// Navigation exceeded its own upper bound
    NavigationTimeout,

    /// The forced-capture timer fired first
    ForcedCapture,

    /// Navigation raised an error
    NavigationFailed(String),
}

/// What happened during one capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureReport {
    pub url: String,
    pub path: PathBuf,
    pub wait: WaitOutcome,

    /// Last error seen, navigation or screenshot
    pub error: Option<String>,

    /// The file is a blank stand-in because no screenshot could be taken,
    /// or nothing of the target had rendered yet
    pub placeholder: bool,

    pub duration_ms: u64,
}

impl CaptureReport {
    /// Whether the file holds a real (possibly partial) render
    pub fn is_usable(&self) -> bool {
        !self.placeholder
    }
}

/// Navigate to `url`, bounded by the race between the navigation timeout
/// and the forced-capture timer.
pub async fn settle<D>(driver: &mut D, url: &str, timeouts: &CaptureTimeouts) -> WaitOutcome
where
    D: PageDriver + ?Sized,
{
    let navigation = tokio::time::timeout(timeouts.navigation, driver.navigate(url));

    tokio::select! {
        result = navigation => match result {
            Ok(Ok(())) => WaitOutcome::Settled,
            Ok(Err(e)) => WaitOutcome::NavigationFailed(e.to_string()),
            Err(_) => WaitOutcome::NavigationTimeout,
        },
        _ = tokio::time::sleep(timeouts.forced_capture) => WaitOutcome::ForcedCapture,
    }
}

/// Capture a full-page screenshot of `url` into `dest`.
///
/// Never fails: errors are logged and recorded in the report, and a
/// placeholder image is written when no screenshot can be taken.
pub async fn capture<D>(
    driver: &mut D,
    url: &str,
    dest: &Path,
    timeouts: &CaptureTimeouts,
) -> CaptureReport
where
    D: PageDriver + ?Sized,
{
    let start = Instant::now();
    match tokio::time::timeout(timeouts.navigation, driver.reset()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Could not reset page before {}: {}", url, e),
        Err(_) => warn!("Resetting page before {} timed out", url),
    }
    let wait = settle(driver, url, timeouts).await;

    let mut last_error = None;
    match &wait {
        WaitOutcome::Settled => debug!("{} settled", url),
        WaitOutcome::NavigationTimeout => {
            warn!("{} did not settle within {:?}; capturing anyway", url, timeouts.navigation)
        }
        WaitOutcome::ForcedCapture => {
            warn!("Forcing capture of {} after {:?}", url, timeouts.forced_capture)
        }
        WaitOutcome::NavigationFailed(reason) => {
            error!("Navigation to {} failed: {}; attempting capture of current state", url, reason);
            last_error = Some(reason.clone());
        }
    }

    let mut placeholder = false;
    let blank = wait != WaitOutcome::Settled && still_blank(driver).await;
    let shot = match blank {
        true => Err(E2eError::Screenshot(format!("nothing rendered for {}", url))),
        false => take_screenshot(driver, dest).await,
    };
    if let Err(e) = shot {
        error!("Screenshot of {} failed: {}", url, e);
        last_error = Some(e.to_string());
        placeholder = true;

        let (width, height) = driver.viewport();
        if let Err(e) = write_placeholder(dest, width, height) {
            error!("Could not write placeholder {}: {}", dest.display(), e);
        }
    }

    CaptureReport {
        url: url.to_string(),
        path: dest.to_path_buf(),
        wait,
        error: last_error,
        placeholder,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Whether the page never left the blank document it was reset to
async fn still_blank<D>(driver: &mut D) -> bool
where
    D: PageDriver + ?Sized,
{
    match driver.evaluate("location.href").await {
        Ok(serde_json::Value::String(href)) => href == BLANK_PAGE,
        _ => false,
    }
}

async fn take_screenshot<D>(driver: &mut D, dest: &Path) -> E2eResult<()>
where
    D: PageDriver + ?Sized,
{
    let png = driver.screenshot_png().await?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, png)?;
    Ok(())
}

/// Blank white image of the viewport size
fn write_placeholder(dest: &Path, width: u32, height: u32) -> E2eResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let blank = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255, 255, 255, 255]));
    std::fs::write(dest, encode_png(&blank)?)?;
    Ok(())
}
