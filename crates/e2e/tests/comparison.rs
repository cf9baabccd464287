//! End-to-end comparison runs against a scripted site

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use pagediff_common::{
    ComparisonOutcome, DeviceProfile, Environment, PageSpec, RunConfig, RunReport, Verdict,
};
use pagediff_e2e::normalize::encode_png;
use pagediff_e2e::{report, ComparisonRunner, E2eError, E2eResult, PageDriver};

/// A rendered page: solid color at a native size
#[derive(Clone, Copy)]
struct Render {
    color: [u8; 4],
    width: u32,
    height: u32,
}

/// Serves solid-color pages by URL. Unknown URLs fail navigation and leave
/// nothing to screenshot.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, Render>,
    hang: bool,
    current: Option<Render>,
    location: String,
    visited: Vec<String>,
}

impl FakeSite {
    fn page(mut self, url: &str, color: [u8; 4], width: u32, height: u32) -> Self {
        self.pages.insert(url.to_string(), Render { color, width, height });
        self
    }
}

#[async_trait]
impl PageDriver for FakeSite {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        self.visited.push(url.to_string());
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.current = self.pages.get(url).copied();
        match self.current {
            Some(_) => {
                self.location = url.to_string();
                Ok(())
            }
            None => Err(E2eError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            }),
        }
    }

    async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>> {
        let render = self
            .current
            .ok_or_else(|| E2eError::Screenshot("nothing rendered".to_string()))?;
        encode_png(&RgbaImage::from_pixel(render.width, render.height, Rgba(render.color)))
    }

    async fn evaluate(&mut self, script: &str) -> E2eResult<serde_json::Value> {
        match script {
            "location.href" => Ok(serde_json::Value::String(self.location.clone())),
            _ => Ok(serde_json::Value::Null),
        }
    }

    async fn click(&mut self, _selector: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn type_text(&mut self, _selector: &str, _text: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn set_viewport(&mut self, _device: &DeviceProfile) -> E2eResult<()> {
        Ok(())
    }

    async fn reset(&mut self) -> E2eResult<()> {
        self.current = None;
        self.location = "about:blank".to_string();
        Ok(())
    }

    fn viewport(&self) -> (u32, u32) {
        (160, 100)
    }
}

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLUE: [u8; 4] = [20, 60, 200, 255];
const RED: [u8; 4] = [220, 30, 30, 255];

fn config(output: &std::path::Path, pages: &[&str]) -> RunConfig {
    let urls = pages
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
[frame]
width = 160
height = 100

[environments.staging]
base_url = "https://staging.example.com"
urls = [{urls}]

[environments.prod]
base_url = "https://www.example.com/"
urls = [{urls}]
"#,
        urls = urls
    );
    let mut config = RunConfig::from_toml(&toml).unwrap();
    config.output_dir = output.to_path_buf();
    config
}

#[tokio::test]
async fn test_one_result_per_page_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/", "/apply/", "/gone/"]);
    let mut site = FakeSite::default()
        .page("https://staging.example.com/", WHITE, 160, 300)
        .page("https://www.example.com/", WHITE, 160, 300)
        .page("https://staging.example.com/apply/", BLUE, 160, 240)
        .page("https://www.example.com/apply/", RED, 160, 240);

    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let report = runner.run(&mut site).await.unwrap();

    let pages: Vec<_> = report.results.iter().map(|r| r.page.path().to_string()).collect();
    assert_eq!(pages, ["/", "/apply/", "/gone/"]);

    assert_eq!(report.results[0].outcome, ComparisonOutcome::Similarity(100.0));
    assert_eq!(report.verdict(&report.results[0]), Verdict::Pass);

    assert!(report.results[1].outcome.similarity().unwrap() < 95.0);
    assert_eq!(report.verdict(&report.results[1]), Verdict::Fail);

    match &report.results[2].outcome {
        ComparisonOutcome::Error(message) => assert!(message.contains("nothing rendered")),
        other => panic!("expected error row, got {:?}", other),
    }
    assert_eq!(report.results[2].staging_url, "https://staging.example.com/gone/");
    assert_eq!(report.results[2].prod_url, "https://www.example.com/gone/");

    let summary = report.summary();
    assert_eq!((summary.passed, summary.failed, summary.errors), (1, 1, 1));
    assert!(!summary.is_success());

    // staging is always captured before prod
    assert_eq!(site.visited[0], "https://staging.example.com/");
    assert_eq!(site.visited[1], "https://www.example.com/");
}

#[tokio::test]
async fn test_apply_page_files_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/apply/"]);
    let mut site = FakeSite::default()
        .page("https://staging.example.com/apply/", BLUE, 160, 100)
        .page("https://www.example.com/apply/", BLUE, 160, 100);

    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let report = runner.run(&mut site).await.unwrap();

    let page = PageSpec::new("/apply/");
    let layout = runner.layout();
    let staging = layout.screenshot(Environment::Staging, &page);
    let prod = layout.screenshot(Environment::Prod, &page);
    let diff = layout.diff(&page);

    assert!(staging.ends_with("screenshots/desktop/staging/_apply_.png"));
    for path in [&staging, &prod, &diff] {
        assert!(path.is_file(), "{} missing", path.display());
    }

    let result = &report.results[0];
    assert_eq!(result.outcome, ComparisonOutcome::Similarity(100.0));
    assert_eq!(result.mismatched_pixels, Some(0));
    assert_eq!(result.total_pixels, Some(160 * 100));
    assert_eq!(result.diff_image.as_deref(), Some(diff.as_path()));
    assert_eq!(result.staging_sha256, result.prod_sha256);
}

#[tokio::test]
async fn test_error_row_leaves_no_previous_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/apply/"]);
    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let page = PageSpec::new("/apply/");
    let layout = runner.layout();

    let mut working = FakeSite::default()
        .page("https://staging.example.com/apply/", BLUE, 160, 100)
        .page("https://www.example.com/apply/", RED, 160, 100);
    runner.run(&mut working).await.unwrap();
    assert!(layout.diff(&page).is_file());
    assert!(layout.screenshot(Environment::Prod, &page).is_file());

    // nothing resolves on the second run, so staging capture fails first
    let mut broken = FakeSite::default();
    let report = runner.run(&mut broken).await.unwrap();

    assert!(matches!(report.results[0].outcome, ComparisonOutcome::Error(_)));
    assert!(!layout.diff(&page).exists());
    assert!(!layout.screenshot(Environment::Prod, &page).exists());

    let html = report::render_html(&report, layout);
    assert!(!html.contains("diff/_apply_.png"));
    assert!(!html.contains("prod/_apply_.png"));
}

#[tokio::test(start_paused = true)]
async fn test_hung_captures_do_not_compare_as_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/", "/apply/"]);
    let mut site = FakeSite {
        hang: true,
        ..Default::default()
    };

    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let report = runner.run(&mut site).await.unwrap();

    for result in &report.results {
        match &result.outcome {
            ComparisonOutcome::Error(message) => assert!(message.contains("nothing rendered")),
            other => panic!("expected error row, got {:?}", other),
        }
    }
    assert_eq!(report.summary().passed, 0);
}

#[tokio::test]
async fn test_different_native_sizes_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/"]);
    let mut site = FakeSite::default()
        .page("https://staging.example.com/", BLUE, 160, 1200)
        .page("https://www.example.com/", BLUE, 320, 90);

    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let report = runner.run(&mut site).await.unwrap();

    let result = &report.results[0];
    assert!(result.outcome.similarity().is_some(), "got {:?}", result.outcome);

    for env in Environment::ALL {
        let img = image::open(runner.layout().screenshot(env, &PageSpec::new("/"))).unwrap();
        assert_eq!((img.width(), img.height()), (160, 100));
    }
}

#[tokio::test]
async fn test_report_and_results_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/"]);
    let mut site = FakeSite::default()
        .page("https://staging.example.com/", WHITE, 160, 100)
        .page("https://www.example.com/", WHITE, 160, 100);

    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let run = runner.run(&mut site).await.unwrap();

    let html_path = report::write_html(&run, runner.layout()).unwrap();
    let json_path = runner.write_results(&run).unwrap();

    let html = std::fs::read_to_string(html_path).unwrap();
    assert!(html.contains("100.00%"));
    assert!(html.contains(r#"src="screenshots/desktop/diff/_.png""#));

    let loaded = RunReport::load(&json_path).unwrap();
    assert_eq!(loaded, run);
}

#[tokio::test(start_paused = true)]
async fn test_run_bounded_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["/"]);
    let mut site = FakeSite {
        hang: true,
        ..Default::default()
    };

    let runner = ComparisonRunner::new(&config, DeviceProfile::desktop());
    let err = runner
        .run_bounded(&mut site, Some(Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::RunTimeout(5)));
}
