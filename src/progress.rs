//! Progress reporting for dispatch runs
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::dispatch::{DispatchProgress, DispatchStats};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays dispatch status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &DispatchProgress) {
        self.bar.set_message(progress_message(progress));
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

fn progress_message(progress: &DispatchProgress) -> String {
    format!(
        "Units: {}/{} | Sent: {} files ({}) | Received: {} targets ({}) | Worker: {}",
        format_number(progress.unit as u64 + 1),
        format_number(progress.total_units as u64),
        format_number(progress.files_sent),
        format_size(progress.bytes_sent, BINARY),
        format_number(progress.targets_received),
        format_size(progress.bytes_received, BINARY),
        progress.worker,
    )
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of a completed dispatch
pub fn print_summary(stats: &DispatchStats, workspace: &str) {
    let duration_secs = stats.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        stats.units as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Dispatch Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Units:").bold(),
        format_number(stats.units as u64)
    );
    println!(
        "  {} {} ({})",
        style("Files Sent:").bold(),
        format_number(stats.files_sent),
        format_size(stats.bytes_sent, BINARY)
    );
    println!(
        "  {} {} ({})",
        style("Targets:").bold(),
        format_number(stats.targets_received),
        format_size(stats.bytes_received, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.1} units/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!("  {} {}", style("Workspace:").bold(), workspace);
    println!();
}

/// Print a header at the start of a dispatch run
pub fn print_header(workspace: &str, compile_file: &str, workers: usize, failed: usize) {
    println!();
    println!(
        "{} {}",
        style("build-relay").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Workspace:").bold(), workspace);
    println!("  {} {}", style("Descriptor:").bold(), compile_file);
    if failed > 0 {
        println!(
            "  {} {} ({} unreachable)",
            style("Workers:").bold(),
            workers,
            style(failed).yellow()
        );
    } else {
        println!("  {} {}", style("Workers:").bold(), workers);
    }
    println!();
}
