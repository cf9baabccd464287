//! Browser automation over the Chrome DevTools Protocol

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use pagediff_common::config::BrowserConfig;
use pagediff_common::DeviceProfile;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Interval between document-state polls while a page settles
const SETTLE_POLL: Duration = Duration::from_millis(250);

/// Resource count must stay unchanged this long to count as settled
const NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Document a page shows before any navigation has committed
pub const BLANK_PAGE: &str = "about:blank";

/// The page operations capture and functional checks need.
///
/// `ChromeDriver` is the real implementation; tests script their own.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait until the document has loaded and
    /// resource fetching has gone quiet. Unbounded; callers race it.
    async fn navigate(&mut self, url: &str) -> E2eResult<()>;

    /// Full-page PNG of whatever is currently rendered
    async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&mut self, script: &str) -> E2eResult<serde_json::Value>;

    async fn click(&mut self, selector: &str) -> E2eResult<()>;

    async fn type_text(&mut self, selector: &str, text: &str) -> E2eResult<()>;

    /// Emulate the viewport of `device`
    async fn set_viewport(&mut self, device: &DeviceProfile) -> E2eResult<()>;

    /// Drop whatever the previous navigation rendered
    async fn reset(&mut self) -> E2eResult<()> {
        Ok(())
    }

    /// Current viewport, used to size placeholder captures
    fn viewport(&self) -> (u32, u32);
}

/// Headless Chromium session with a single page
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    viewport: (u32, u32),
}

impl ChromeDriver {
    /// Launch Chromium and open a blank page sized for `device`
    pub async fn launch(
        config: &BrowserConfig,
        device: &DeviceProfile,
        request_timeout: Duration,
    ) -> E2eResult<Self> {
        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--hide-scrollbars")
            .window_size(device.width, device.height)
            .request_timeout(request_timeout);

        if let Some(exe) = config.executable.clone().or_else(detect_chromium) {
            builder = builder.chrome_executable(exe);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        for arg in &config.args {
            builder = builder.arg(arg.as_str());
        }

        let cdp_config = builder.build().map_err(E2eError::BrowserLaunch)?;

        info!("Launching Chromium for device {}", device.label());
        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event loop ended: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page(BLANK_PAGE)
            .await
            .map_err(|e| E2eError::BrowserLaunch(format!("new_page failed: {}", e)))?;

        let mut driver = Self {
            browser,
            page,
            handler,
            viewport: (device.width, device.height),
        };
        driver.set_viewport(device).await?;

        Ok(driver)
    }

    /// Shut the browser down
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close error (non-fatal): {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    async fn ready_state(&self) -> Option<String> {
        self.page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|r| r.into_value::<String>().ok())
    }

    async fn resource_count(&self) -> Option<u64> {
        self.page
            .evaluate("performance.getEntriesByType('resource').length")
            .await
            .ok()
            .and_then(|r| r.into_value::<u64>().ok())
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        debug!("Navigating to {}", url);
        self.page.goto(url).await.map_err(|e| E2eError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        while self.ready_state().await.as_deref() != Some("complete") {
            tokio::time::sleep(SETTLE_POLL).await;
        }

        let mut last = self.resource_count().await;
        loop {
            tokio::time::sleep(NETWORK_QUIET).await;
            let current = self.resource_count().await;
            if current == last {
                break;
            }
            last = current;
        }

        Ok(())
    }

    async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| E2eError::Screenshot(e.to_string()))
    }

    async fn evaluate(&mut self, script: &str) -> E2eResult<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn set_viewport(&mut self, device: &DeviceProfile) -> E2eResult<()> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                device.width as i64,
                device.height as i64,
                1.0,
                device.mobile,
            ))
            .await?;
        self.viewport = (device.width, device.height);
        Ok(())
    }

    async fn reset(&mut self) -> E2eResult<()> {
        self.page.goto(BLANK_PAGE).await.map_err(|e| E2eError::Navigation {
            url: BLANK_PAGE.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

/// Find a Chromium-family binary on PATH
fn detect_chromium() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
    ];

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| CANDIDATES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}
