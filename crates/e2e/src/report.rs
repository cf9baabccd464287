//! Static HTML report for a comparison run

use std::fmt::Write as _;
use std::path::PathBuf;

use htmlize::{escape_attribute, escape_text};
use pagediff_common::{ComparisonResult, Environment, OutputLayout, RunReport, Verdict};
use tracing::info;

use crate::error::E2eResult;

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; margin: 24px; color: #1f2933; }
        h1 { font-size: 22px; }
        .meta { color: #52606d; margin-bottom: 16px; }
        .summary { display: flex; gap: 12px; margin-bottom: 20px; }
        .summary div { padding: 10px 16px; border-radius: 6px; background: #f0f4f8; }
        .summary .pass { background: #e3f9e5; }
        .summary .fail { background: #ffe3e3; }
        .summary .error { background: #fff3c4; }
        table { border-collapse: collapse; width: 100%; }
        th, td { border: 1px solid #d9e2ec; padding: 8px; text-align: left; vertical-align: top; }
        th { background: #f0f4f8; }
        td.pass { color: #207227; font-weight: 600; }
        td.fail { color: #ab091e; font-weight: 600; }
        td.error { color: #8d2b0b; font-weight: 600; }
        img.thumb { max-width: 200px; max-height: 125px; border: 1px solid #d9e2ec; }
        .na { color: #9aa5b1; }
"#;

/// Render the report document.
///
/// Thumbnail links are relative to the layout root and only emitted for
/// files that exist on disk.
pub fn render_html(report: &RunReport, layout: &OutputLayout) -> String {
    let summary = report.summary();
    let meta = &report.metadata;
    let device = meta.device.label();

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Visual comparison - {device}</title>
    <style>{style}</style>
</head>
<body>
    <h1>Visual comparison report - {device}</h1>
    <div class="meta">
        Staging: <a href="{staging_href}">{staging}</a><br>
        Prod: <a href="{prod_href}">{prod}</a><br>
        Generated: {started} &middot; Pass threshold: {threshold:.2}% &middot; Duration: {duration} ms
    </div>
    <div class="summary">
        <div>Total: {total}</div>
        <div class="pass">Pass: {passed}</div>
        <div class="fail">Fail: {failed}</div>
        <div class="error">Error: {errors}</div>
    </div>
    <table>
        <tr><th>Page</th><th>Similarity</th><th>Result</th><th>Staging</th><th>Prod</th><th>Diff</th></tr>
"#,
        device = escape_text(device.as_str()),
        style = STYLE,
        staging_href = escape_attribute(meta.staging_base_url.as_str()),
        staging = escape_text(meta.staging_base_url.as_str()),
        prod_href = escape_attribute(meta.prod_base_url.as_str()),
        prod = escape_text(meta.prod_base_url.as_str()),
        started = meta.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        threshold = meta.pass_threshold,
        duration = meta.duration_ms,
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors,
    );

    for result in &report.results {
        html.push_str(&render_row(report, result, layout));
    }

    html.push_str("    </table>\n</body>\n</html>\n");
    html
}

fn render_row(report: &RunReport, result: &ComparisonResult, layout: &OutputLayout) -> String {
    let verdict = report.verdict(result);
    let class = match verdict {
        Verdict::Pass => "pass",
        Verdict::Fail => "fail",
        Verdict::Error => "error",
    };

    let mut similarity = escape_text(result.outcome.label()).into_owned();
    if let pagediff_common::ComparisonOutcome::Error(message) = &result.outcome {
        let _ = write!(similarity, "<br><small>{}</small>", escape_text(message.as_str()));
    }

    format!(
        r#"        <tr>
            <td>{page}<br><small><a href="{staging_href}">staging</a> &middot; <a href="{prod_href}">prod</a></small></td>
            <td>{similarity}</td>
            <td class="{class}">{verdict}</td>
            <td>{staging}</td>
            <td>{prod}</td>
            <td>{diff}</td>
        </tr>
"#,
        page = escape_text(result.page.path()),
        staging_href = escape_attribute(result.staging_url.as_str()),
        prod_href = escape_attribute(result.prod_url.as_str()),
        similarity = similarity,
        class = class,
        verdict = verdict,
        staging = thumbnail(layout, layout.screenshot(Environment::Staging, &result.page), "staging"),
        prod = thumbnail(layout, layout.screenshot(Environment::Prod, &result.page), "prod"),
        diff = thumbnail(layout, layout.diff(&result.page), "diff"),
    )
}

fn thumbnail(layout: &OutputLayout, path: PathBuf, alt: &str) -> String {
    if !path.is_file() {
        return r#"<span class="na">N/A</span>"#.to_string();
    }
    let link = layout.relative_link(&path);
    let href = escape_attribute(link.as_str());
    format!(
        r#"<a href="{href}"><img class="thumb" src="{href}" alt="{alt}"></a>"#,
        href = href,
        alt = alt
    )
}

/// Write `visual_comparison_report_<device>.html` under the layout root
pub fn write_html(report: &RunReport, layout: &OutputLayout) -> E2eResult<PathBuf> {
    let path = layout.report_html();
    std::fs::create_dir_all(layout.root())?;
    std::fs::write(&path, render_html(report, layout))?;
    info!("Report written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagediff_common::{ComparisonOutcome, DeviceProfile, PageSpec, RunMetadata};

    fn result(path: &str, outcome: ComparisonOutcome) -> ComparisonResult {
        ComparisonResult {
            outcome,
            ..ComparisonResult::failed(
                PageSpec::new(path),
                format!("https://staging.example.com{}", path),
                format!("https://www.example.com{}", path),
                "",
            )
        }
    }

    fn report(results: Vec<ComparisonResult>) -> RunReport {
        RunReport {
            metadata: RunMetadata {
                device: DeviceProfile::desktop(),
                staging_base_url: "https://staging.example.com".to_string(),
                prod_base_url: "https://www.example.com".to_string(),
                started_at: chrono::Utc::now(),
                duration_ms: 1234,
                pass_threshold: 95.0,
            },
            results,
        }
    }

    #[test]
    fn test_missing_thumbnails_render_na() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "desktop");
        let report = report(vec![result("/apply/", ComparisonOutcome::Error("capture failed".into()))]);

        let html = render_html(&report, &layout);

        assert_eq!(html.matches("N/A").count(), 3);
        assert!(!html.contains("<img"));
        assert!(html.contains("capture failed"));
        assert!(html.contains("Error: 1"));
    }

    #[test]
    fn test_existing_thumbnails_are_linked() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "desktop");
        layout.create_dirs().unwrap();
        let page = PageSpec::new("/apply/");
        for path in [
            layout.screenshot(Environment::Staging, &page),
            layout.screenshot(Environment::Prod, &page),
        ] {
            std::fs::write(path, b"png").unwrap();
        }
        let report = report(vec![result("/apply/", ComparisonOutcome::Similarity(99.5))]);

        let html = render_html(&report, &layout);

        assert!(html.contains(r#"href="screenshots/desktop/staging/_apply_.png""#));
        assert!(html.contains(r#"href="screenshots/desktop/prod/_apply_.png""#));
        // diff was never written
        assert_eq!(html.matches("N/A").count(), 1);
        assert!(html.contains("99.50%"));
        assert!(html.contains("Pass: 1"));
    }

    #[test]
    fn test_thumbnail_links_survive_query_characters() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "desktop");
        layout.create_dirs().unwrap();
        let page = PageSpec::new("/search?q=1");
        std::fs::write(layout.screenshot(Environment::Staging, &page), b"png").unwrap();
        let report = report(vec![result("/search?q=1", ComparisonOutcome::Similarity(97.0))]);

        let html = render_html(&report, &layout);

        assert!(html.contains(r#"href="screenshots/desktop/staging/_search%3Fq=1.png""#));
    }

    #[test]
    fn test_rows_follow_result_order_and_escape() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "desktop");
        let report = report(vec![
            result("/b/", ComparisonOutcome::Similarity(50.0)),
            result("/a/?q=<x>", ComparisonOutcome::SizeMismatch),
        ]);

        let html = render_html(&report, &layout);

        let b = html.find("<td>/b/").unwrap();
        let a = html.find("<td>/a/?q=&lt;x&gt;").unwrap();
        assert!(b < a);
        assert!(html.contains("Size mismatch"));
        assert!(html.contains("Fail: 1"));
    }

    #[test]
    fn test_write_html_uses_device_name() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "desktop");
        let path = write_html(&report(vec![]), &layout).unwrap();
        assert!(path.ends_with("visual_comparison_report_desktop.html"));
        assert!(path.exists());
    }
}
