//! Comparison runner: captures every configured page on staging and prod,
//! normalizes, compares and collects one result per page

use std::path::PathBuf;
use std::time::{Duration, Instant};

use pagediff_common::config::{Environments, FrameConfig, RunConfig};
use pagediff_common::{
    ComparisonOutcome, ComparisonResult, DeviceProfile, Environment, OutputLayout, PageSpec,
    RunMetadata, RunReport, Verdict,
};
use tracing::{debug, error, info, warn};

use crate::browser::PageDriver;
use crate::capture::{capture, CaptureReport, CaptureTimeouts};
use crate::error::{E2eError, E2eResult};
use crate::normalize::normalize;
use crate::visual::{compare_files, hash_file, CompareOptions, Comparison};

/// Drives one device run across all configured pages
pub struct ComparisonRunner {
    environments: Environments,
    device: DeviceProfile,
    layout: OutputLayout,
    frame: FrameConfig,
    timeouts: CaptureTimeouts,
    compare: CompareOptions,
    pass_threshold: f64,
}

impl ComparisonRunner {
    pub fn new(config: &RunConfig, device: DeviceProfile) -> Self {
        Self {
            environments: config.environments.clone(),
            layout: OutputLayout::new(&config.output_dir, &device.name),
            device,
            frame: config.frame,
            timeouts: CaptureTimeouts::from(&config.capture),
            compare: CompareOptions::from_thresholds(&config.thresholds),
            pass_threshold: config.thresholds.pass_percent,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    /// Run every staging page in configuration order.
    ///
    /// Only setup failures (output directories, viewport) are returned as
    /// errors; per-page failures become `Error` rows.
    pub async fn run<D>(&self, driver: &mut D) -> E2eResult<RunReport>
    where
        D: PageDriver + ?Sized,
    {
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        self.layout.create_dirs()?;
        driver.set_viewport(&self.device).await?;

        let pages = &self.environments.staging.urls;
        info!("Comparing {} page(s) on {}", pages.len(), self.device.label());

        let mut results = Vec::with_capacity(pages.len());
        for page in pages {
            let result = self.compare_page(driver, page).await;
            match Verdict::classify(&result.outcome, self.pass_threshold) {
                Verdict::Pass => info!("✓ {} {}", page, result.outcome.label()),
                Verdict::Fail => warn!("✗ {} {}", page, result.outcome.label()),
                Verdict::Error => match &result.outcome {
                    ComparisonOutcome::Error(message) => error!("✗ {} - {}", page, message),
                    other => error!("✗ {} - {}", page, other.label()),
                },
            }
            results.push(result);
        }

        let report = RunReport {
            metadata: RunMetadata {
                device: self.device.clone(),
                staging_base_url: self.environments.staging.base_url.clone(),
                prod_base_url: self.environments.prod.base_url.clone(),
                started_at,
                duration_ms: start.elapsed().as_millis() as u64,
                pass_threshold: self.pass_threshold,
            },
            results,
        };

        let summary = report.summary();
        info!(
            "Results for {}: {} passed, {} failed, {} errors ({} ms)",
            self.device.name, summary.passed, summary.failed, summary.errors, report.metadata.duration_ms
        );

        Ok(report)
    }

    /// `run` under an outer time limit
    pub async fn run_bounded<D>(&self, driver: &mut D, limit: Option<Duration>) -> E2eResult<RunReport>
    where
        D: PageDriver + ?Sized,
    {
        match limit {
            Some(limit) => tokio::time::timeout(limit, self.run(driver))
                .await
                .map_err(|_| E2eError::RunTimeout(limit.as_secs()))?,
            None => self.run(driver).await,
        }
    }

    /// Compare one page; never fails
    pub async fn compare_page<D>(&self, driver: &mut D, page: &PageSpec) -> ComparisonResult
    where
        D: PageDriver + ?Sized,
    {
        let start = Instant::now();
        match self.try_compare_page(driver, page).await {
            Ok(mut result) => {
                result.duration_ms = start.elapsed().as_millis() as u64;
                result
            }
            Err(e) => ComparisonResult {
                duration_ms: start.elapsed().as_millis() as u64,
                ..ComparisonResult::failed(
                    page.clone(),
                    page.join(&self.environments.staging.base_url),
                    page.join(&self.environments.prod.base_url),
                    e.to_string(),
                )
            },
        }
    }

    async fn try_compare_page<D>(&self, driver: &mut D, page: &PageSpec) -> E2eResult<ComparisonResult>
    where
        D: PageDriver + ?Sized,
    {
        self.clear_artifacts(page)?;

        let staging_url = page.url_on(&self.environments.staging.base_url)?;
        let prod_url = page.url_on(&self.environments.prod.base_url)?;

        let staging_path = self.capture_env(driver, Environment::Staging, page, &staging_url).await?;
        let prod_path = self.capture_env(driver, Environment::Prod, page, &prod_url).await?;

        let staging_sha256 = hash_file(&staging_path)?;
        let prod_sha256 = hash_file(&prod_path)?;

        normalize(&staging_path, self.frame.width, self.frame.height)?;
        normalize(&prod_path, self.frame.width, self.frame.height)?;

        let diff_path = self.layout.diff(page);
        let mut result = ComparisonResult {
            staging_sha256: Some(staging_sha256),
            prod_sha256: Some(prod_sha256),
            ..ComparisonResult::failed(page.clone(), staging_url, prod_url, String::new())
        };

        match compare_files(&staging_path, &prod_path, &diff_path, &self.compare)? {
            Comparison::Compared(pixels) => {
                result.outcome = ComparisonOutcome::Similarity(pixels.similarity());
                result.mismatched_pixels = Some(pixels.mismatched);
                result.total_pixels = Some(pixels.total);
                result.diff_image = Some(diff_path);
            }
            Comparison::SizeMismatch { .. } => {
                result.outcome = ComparisonOutcome::SizeMismatch;
            }
        }

        Ok(result)
    }

    /// Remove a previous run's screenshots and diff for `page` so rows only
    /// link files produced by this run
    fn clear_artifacts(&self, page: &PageSpec) -> E2eResult<()> {
        let paths = [
            self.layout.screenshot(Environment::Staging, page),
            self.layout.screenshot(Environment::Prod, page),
            self.layout.diff(page),
        ];
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn capture_env<D>(
        &self,
        driver: &mut D,
        env: Environment,
        page: &PageSpec,
        url: &str,
    ) -> E2eResult<PathBuf>
    where
        D: PageDriver + ?Sized,
    {
        let dest = self.layout.screenshot(env, page);
        let report: CaptureReport = capture(driver, url, &dest, &self.timeouts).await;
        debug!("Captured {} {} in {} ms ({:?})", env, url, report.duration_ms, report.wait);

        if !report.is_usable() {
            return Err(E2eError::CaptureFailed {
                url: url.to_string(),
                reason: report.error.unwrap_or_else(|| "no screenshot taken".to_string()),
            });
        }
        Ok(dest)
    }

    /// Write the run's results as JSON next to the HTML report
    pub fn write_results(&self, report: &RunReport) -> E2eResult<PathBuf> {
        let path = self.layout.results_json();
        report.save(&path)?;
        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
