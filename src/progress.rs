//! Progress reporting for the collection sweep
//!
//! Provides real-time progress display using indicatif progress bars.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays sweep status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        // Plain bar if the template is rejected
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} collections ({per_sec}, eta {eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update with `(visited, expected)` from the walker
    ///
    /// Re-delivered collections can push `visited` past `expected`; the bar
    /// length grows to match.
    pub fn update(&self, visited: u64, expected: u64) {
        self.bar.set_length(expected.max(visited));
        self.bar.set_position(visited);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Final numbers shown after a sweep
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub visited: u64,
    pub expected: u64,
    pub verified: u64,
    pub pages: u64,
    pub blocks: u64,
    pub referenced_bytes: u64,
    pub duration: Duration,
}

/// Print a summary of a verified sweep
pub fn print_summary(summary: &SweepSummary, db_path: &str, db_size: Option<u64>) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.visited as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Sweep Verified").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} ({} at start, {} at boundary)",
        style("Collections:").bold(),
        format_number(summary.visited),
        format_number(summary.expected),
        format_number(summary.verified)
    );
    println!("  {} {}", style("Pages:").bold(), format_number(summary.pages));
    println!(
        "  {} {} ({})",
        style("Blocks:").bold(),
        format_number(summary.blocks),
        format_size(summary.referenced_bytes, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} collections/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if let Some(size) = db_size {
        println!(
            "  {} {} ({})",
            style("Inventory:").bold(),
            db_path,
            format_size(size, BINARY)
        );
    } else {
        println!("  {} {}", style("Inventory:").bold(), db_path);
    }
    println!();
}

/// Print a header at the start of the sweep
pub fn print_header(source: &str, page_size: u64, output: &str) {
    let page = if page_size == 0 {
        "server maximum".to_string()
    } else {
        format_number(page_size)
    };

    println!();
    println!(
        "{} {}",
        style("keep-sweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Page size:").bold(), page);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}
