//! Functional smoke checks: broken images, navigation links and form flows

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pagediff_common::config::{ChecksConfig, RunConfig};
use pagediff_common::{layout, Environment, PageSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::browser::PageDriver;
use crate::capture::{settle, CaptureTimeouts, WaitOutcome};
use crate::error::{E2eError, E2eResult};
use crate::flow::{FlowSpec, FlowStep, WaitState};

/// Interval between element-state polls in `wait` steps
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Outcome of one functional check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub environment: Environment,
    pub passed: bool,
    pub details: Vec<String>,
    pub duration_ms: u64,
}

/// An `<img>` element as reported by the page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProbe {
    pub src: String,
    pub complete: bool,
    pub natural_width: u32,
}

impl ImageProbe {
    /// Finished loading without decodable content, or has no source
    pub fn is_broken(&self) -> bool {
        self.src.is_empty() || (self.complete && self.natural_width == 0)
    }
}

/// Sources of broken images, in document order
pub fn broken_images(images: &[ImageProbe]) -> Vec<String> {
    images
        .iter()
        .filter(|img| img.is_broken())
        .map(|img| {
            if img.src.is_empty() {
                "<img> without src".to_string()
            } else {
                img.src.clone()
            }
        })
        .collect()
}

/// Resolve navigation hrefs against the page URL, dropping non-HTTP and
/// fragment-only links and duplicates
pub fn collect_links(page_url: &Url, hrefs: &[String]) -> Vec<Url> {
    let mut seen = HashSet::new();
    hrefs
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && !h.starts_with('#'))
        .filter_map(|h| page_url.join(h).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// JSON string literal for embedding into scripts
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Runs functional checks against one environment
pub struct FunctionalChecks {
    env: Environment,
    base_url: String,
    checks: ChecksConfig,
    timeouts: CaptureTimeouts,
    output_dir: PathBuf,
    http: reqwest::Client,
}

impl FunctionalChecks {
    pub fn new(config: &RunConfig, env: Environment) -> E2eResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.checks.link_timeout_secs))
            .build()?;

        Ok(Self {
            env,
            base_url: config.environments.get(env).base_url.clone(),
            checks: config.checks.clone(),
            timeouts: CaptureTimeouts::from(&config.capture),
            output_dir: config.output_dir.clone(),
            http,
        })
    }

    /// Run every configured check in a fixed order
    pub async fn run_all<D>(&self, driver: &mut D) -> Vec<CheckResult>
    where
        D: PageDriver + ?Sized,
    {
        let mut results = Vec::new();

        for page in &self.checks.image_pages {
            results.push(self.broken_images(driver, page).await);
        }
        results.push(self.nav_links(driver).await);

        if let Some(dir) = &self.checks.flows_dir {
            match FlowSpec::load_all(dir) {
                Ok(flows) => {
                    for flow in &flows {
                        results.push(self.run_flow(driver, flow).await);
                    }
                }
                Err(e) => results.push(self.result("flows", Instant::now(), vec![e.to_string()], false)),
            }
        }

        for r in &results {
            if r.passed {
                info!("✓ [{}] {} ({} ms)", r.environment, r.name, r.duration_ms);
            } else {
                error!("✗ [{}] {} - {}", r.environment, r.name, r.details.join("; "));
            }
        }

        results
    }

    /// Scan a page for images that failed to load
    pub async fn broken_images<D>(&self, driver: &mut D, page: &PageSpec) -> CheckResult
    where
        D: PageDriver + ?Sized,
    {
        let start = Instant::now();
        let name = format!("broken-images:{}", page);

        let scan = async {
            let url = page.url_on(&self.base_url)?;
            self.open(driver, &url).await?;
            let value = driver
                .evaluate(
                    "(() => Array.from(document.images).map(img => ({ \
                     src: img.currentSrc || img.getAttribute('src') || '', \
                     complete: img.complete, naturalWidth: img.naturalWidth })))()",
                )
                .await?;
            let images: Vec<ImageProbe> = serde_json::from_value(value)?;
            debug!("{} images on {}", images.len(), url);
            Ok::<_, E2eError>(broken_images(&images))
        };

        match scan.await {
            Ok(broken) => {
                let passed = broken.is_empty();
                self.result(&name, start, broken, passed)
            }
            Err(e) => self.result(&name, start, vec![e.to_string()], false),
        }
    }

    /// Validate every link in the navigation menu responds below 400
    pub async fn nav_links<D>(&self, driver: &mut D) -> CheckResult
    where
        D: PageDriver + ?Sized,
    {
        let start = Instant::now();
        let name = format!("nav-links:{}", self.checks.nav_page);

        let gather = async {
            let url = self.checks.nav_page.url_on(&self.base_url)?;
            self.open(driver, &url).await?;
            let script = format!(
                "(() => Array.from(document.querySelectorAll({})).map(a => a.getAttribute('href') || ''))()",
                js_str(&self.checks.nav_selector)
            );
            let hrefs: Vec<String> = serde_json::from_value(driver.evaluate(&script).await?)?;
            let page_url = Url::parse(&url).map_err(|e| pagediff_common::Error::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            Ok::<_, E2eError>(collect_links(&page_url, &hrefs))
        };

        let links = match gather.await {
            Ok(links) => links,
            Err(e) => return self.result(&name, start, vec![e.to_string()], false),
        };

        if links.is_empty() {
            return self.result(
                &name,
                start,
                vec![format!("no links matched '{}'", self.checks.nav_selector)],
                false,
            );
        }

        let mut failures = Vec::new();
        for link in &links {
            match self.http.get(link.as_str()).send().await {
                Ok(resp) if resp.status().as_u16() < 400 => debug!("{} -> {}", link, resp.status()),
                Ok(resp) => failures.push(format!("{} returned {}", link, resp.status().as_u16())),
                Err(e) => failures.push(format!("{} failed: {}", link, e)),
            }
        }

        let passed = failures.is_empty();
        self.result(&name, start, failures, passed)
    }

    /// Execute a flow, stopping at the first failing step
    pub async fn run_flow<D>(&self, driver: &mut D, flow: &FlowSpec) -> CheckResult
    where
        D: PageDriver + ?Sized,
    {
        let start = Instant::now();
        let name = format!("flow:{}", flow.name);

        for step in &flow.steps {
            debug!("[{}] {}", flow.name, step.label());
            if let Err(e) = self.execute_step(driver, flow, step).await {
                let reason = if matches!(e, E2eError::StepFailed { .. }) {
                    e.to_string()
                } else {
                    E2eError::StepFailed {
                        step: step.label(),
                        reason: e.to_string(),
                    }
                    .to_string()
                };
                return self.result(&name, start, vec![reason], false);
            }
        }

        self.result(&name, start, Vec::new(), true)
    }

    async fn execute_step<D>(&self, driver: &mut D, flow: &FlowSpec, step: &FlowStep) -> E2eResult<()>
    where
        D: PageDriver + ?Sized,
    {
        match step {
            FlowStep::Navigate { url } => {
                let target = if url.starts_with('/') {
                    PageSpec::new(url.as_str()).url_on(&self.base_url)?
                } else {
                    url.clone()
                };
                self.open(driver, &target).await
            }
            FlowStep::Fill { selector, value, clear_first } => {
                if *clear_first {
                    let script = format!(
                        "(() => {{ const el = document.querySelector({}); if (!el) return false; el.value = ''; return true; }})()",
                        js_str(selector)
                    );
                    self.expect_true(driver, step, &script).await?;
                }
                driver.type_text(selector, value).await
            }
            FlowStep::Click { selector } => driver.click(selector).await,
            FlowStep::Select { selector, value } => {
                let script = format!(
                    "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
                     el.value = {val}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                     return el.value === {val}; }})()",
                    sel = js_str(selector),
                    val = js_str(value)
                );
                self.expect_true(driver, step, &script).await
            }
            FlowStep::Check { selector, checked } => {
                let script = format!(
                    "(() => {{ const el = document.querySelector({}); if (!el) return false; \
                     if (el.checked !== {want}) el.click(); return el.checked === {want}; }})()",
                    js_str(selector),
                    want = checked
                );
                self.expect_true(driver, step, &script).await
            }
            FlowStep::Wait { selector, timeout_ms, state } => {
                self.wait_for(driver, selector, *state, Duration::from_millis(*timeout_ms))
                    .await
            }
            FlowStep::Assert { selector, visible, text, text_contains, count } => {
                let script = format!(
                    "(() => {{ const els = document.querySelectorAll({}); const el = els[0]; \
                     return {{ count: els.length, visible: !!el && el.getClientRects().length > 0, \
                     text: el ? el.textContent.trim() : null }}; }})()",
                    js_str(selector)
                );
                let probe: ElementProbe = serde_json::from_value(driver.evaluate(&script).await?)?;
                check_assertion(selector, &probe, *visible, text.as_deref(), text_contains.as_deref(), *count)
            }
            FlowStep::Screenshot { name } => {
                let dest = self
                    .output_dir
                    .join("flows")
                    .join(self.env.as_str())
                    .join(format!("{}_{}.png", flow.name, name));
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&dest, driver.screenshot_png().await?)?;
                Ok(())
            }
            FlowStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
        }
    }

    /// Navigate with the capture race; only a navigation error fails
    async fn open<D>(&self, driver: &mut D, url: &str) -> E2eResult<()>
    where
        D: PageDriver + ?Sized,
    {
        match settle(driver, url, &self.timeouts).await {
            WaitOutcome::NavigationFailed(reason) => Err(E2eError::Navigation {
                url: url.to_string(),
                reason,
            }),
            WaitOutcome::Settled => Ok(()),
            other => {
                warn!("{} not settled ({:?}); continuing", url, other);
                Ok(())
            }
        }
    }

    async fn expect_true<D>(&self, driver: &mut D, step: &FlowStep, script: &str) -> E2eResult<()>
    where
        D: PageDriver + ?Sized,
    {
        match driver.evaluate(script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(E2eError::StepFailed {
                step: step.label(),
                reason: "element missing or value not applied".to_string(),
            }),
        }
    }

    async fn wait_for<D>(&self, driver: &mut D, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()>
    where
        D: PageDriver + ?Sized,
    {
        let condition = match state {
            WaitState::Attached => "!!el",
            WaitState::Visible => "!!el && el.getClientRects().length > 0",
            WaitState::Hidden => "!el || el.getClientRects().length === 0",
        };
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return {}; }})()",
            js_str(selector),
            condition
        );

        let deadline = Instant::now() + timeout;
        loop {
            if driver.evaluate(&script).await? == serde_json::Value::Bool(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::Timeout(format!("{} to be {:?}", selector, state)));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    fn result(&self, name: &str, start: Instant, details: Vec<String>, passed: bool) -> CheckResult {
        CheckResult {
            name: name.to_string(),
            environment: self.env,
            passed,
            details,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Element facts gathered for an `assert` step
#[derive(Debug, Clone, Deserialize)]
struct ElementProbe {
    count: usize,
    visible: bool,
    text: Option<String>,
}

fn check_assertion(
    selector: &str,
    probe: &ElementProbe,
    visible: Option<bool>,
    text: Option<&str>,
    text_contains: Option<&str>,
    count: Option<usize>,
) -> E2eResult<()> {
    if let Some(expected) = count {
        if probe.count != expected {
            return Err(E2eError::AssertionFailed(format!(
                "{}: expected {} element(s), found {}",
                selector, expected, probe.count
            )));
        }
    }
    if let Some(expected) = visible {
        if probe.visible != expected {
            return Err(E2eError::AssertionFailed(format!(
                "{}: expected visible={}, was {}",
                selector, expected, probe.visible
            )));
        }
    }
    let actual = probe.text.as_deref().unwrap_or("");
    if let Some(expected) = text {
        if actual != expected {
            return Err(E2eError::AssertionFailed(format!(
                "{}: expected text '{}', got '{}'",
                selector, expected, actual
            )));
        }
    }
    if let Some(expected) = text_contains {
        if !actual.contains(expected) {
            return Err(E2eError::AssertionFailed(format!(
                "{}: '{}' does not contain '{}'",
                selector, actual, expected
            )));
        }
    }
    Ok(())
}

/// Write check results to `functional_checks_<environment>.json`
pub fn write_check_results(root: &Path, env: Environment, results: &[CheckResult]) -> E2eResult<PathBuf> {
    let path = layout::checks_json(root, env);
    std::fs::create_dir_all(root)?;
    std::fs::write(&path, serde_json::to_string_pretty(results)?)?;
    info!("Check results written to: {}", path.display());
    Ok(path)
}
