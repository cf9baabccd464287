//! Terminal output: result tables and status lines

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pagediff_common::{RunSummary, Verdict};
use serde::Serialize;

/// How result rows are printed to stdout
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bordered table with colored verdicts
    #[default]
    Table,
    /// Pretty-printed JSON array, for scripting
    Json,
}

/// A row type that can be shown in a result table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Build the table for `rows` without printing it
pub fn render_table<T: TableDisplay>(rows: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(T::headers());
    for row in rows {
        table.add_row(row.row());
    }
    table
}

pub fn print_list<T: Serialize + TableDisplay>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table if rows.is_empty() => println!("No results."),
        OutputFormat::Table => println!("{}", render_table(rows)),
        OutputFormat::Json => match serde_json::to_string_pretty(rows) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&format!("Could not encode results: {}", e)),
        },
    }
}

/// Colored cell text for a page verdict
pub fn verdict_cell(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => "✓ Pass".green().to_string(),
        Verdict::Fail => "✗ Fail".red().to_string(),
        Verdict::Error => "✗ Error".yellow().to_string(),
    }
}

/// Colored ✓/✗ for a check outcome
pub fn passed_cell(passed: bool) -> String {
    if passed { "✓".green() } else { "✗".red() }.to_string()
}

/// One status line with the totals of a device run
pub fn print_summary(device: &str, summary: &RunSummary) {
    let line = format!(
        "{}: {} passed, {} failed, {} errors (of {})",
        device, summary.passed, summary.failed, summary.errors, summary.total
    );
    if summary.is_success() {
        print_success(&line);
    } else {
        print_warning(&line);
    }
}

pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str, u32);

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["Page", "Pixels"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    #[test]
    fn test_render_table_contains_rows() {
        let rendered = render_table(&[Row("/", 12), Row("/apply/", 0)]).to_string();
        assert!(rendered.contains("Pixels"));
        assert!(rendered.contains("/apply/"));
        assert!(rendered.contains("12"));
    }

    #[test]
    fn test_verdict_cells() {
        colored::control::set_override(false);
        assert_eq!(verdict_cell(Verdict::Pass), "✓ Pass");
        assert_eq!(verdict_cell(Verdict::Error), "✗ Error");
        assert_eq!(passed_cell(false), "✗");
    }
}
