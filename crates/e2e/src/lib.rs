//! pagediff comparison engine
//!
//! This crate drives a Chromium browser to capture the same pages on a
//! staging and a production deployment, normalizes both captures into a
//! common frame, compares them pixel by pixel and writes an HTML report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ComparisonRunner (per device)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  for page in staging.urls:                                  │
//! │    ├── capture(staging_url) -> screenshots/<dev>/staging/   │
//! │    ├── capture(prod_url)    -> screenshots/<dev>/prod/      │
//! │    ├── normalize(both, frame)                               │
//! │    └── compare_files(staging, prod) -> screenshots/<dev>/diff/│
//! ├─────────────────────────────────────────────────────────────┤
//! │  capture: select! { navigate (bounded) | forced timer }     │
//! │           then screenshot, placeholder on failure           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  report::write_html  -> visual_comparison_report_<dev>.html │
//! │  runner.write_results -> visual_comparison_results_<dev>.json│
//! ├─────────────────────────────────────────────────────────────┤
//! │  FunctionalChecks (per environment)                         │
//! │    ├── broken images                                        │
//! │    ├── navigation links (HTTP status)                       │
//! │    └── YAML form flows                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything that touches the browser goes through [`PageDriver`], so the
//! pipeline can be exercised without Chromium.

pub mod browser;
pub mod capture;
pub mod checks;
pub mod error;
pub mod flow;
pub mod health;
pub mod normalize;
pub mod report;
pub mod runner;
pub mod visual;

pub use browser::{ChromeDriver, PageDriver};
pub use capture::{capture, settle, CaptureReport, CaptureTimeouts, WaitOutcome};
pub use checks::{CheckResult, FunctionalChecks};
pub use error::{E2eError, E2eResult};
pub use flow::{FlowSpec, FlowStep};
pub use runner::ComparisonRunner;
