//! End-of-run summary and diagnostics printed to stdout.

use std::path::{Path, PathBuf};

use exporter_core::RunSummary;

/// Printed when Ctrl+C stopped the run.
pub const INTERRUPTED_MESSAGE: &str = "Download interrupted by user. Progress saved.";

/// Shown when a non-dry run downloaded nothing.
pub const NO_DOWNLOADS_HINT: [&str; 7] = [
    "No files were downloaded. Possible reasons:",
    "  - All files were already downloaded",
    "  - Files exist in the output directory",
    "  - Files exist in the local check directory",
    "  - There might be an issue with the CSV file or subdomain configuration",
    "",
    "Check the detailed log file for more information.",
];

/// Inputs echoed back in the summary header.
#[derive(Debug, Clone)]
pub struct RunContext<'a> {
    pub csv: &'a Path,
    pub output_dir: &'a Path,
    pub dry_run: bool,
}

/// Returns `path` made absolute against the working directory, or unchanged
/// if that fails.
pub fn display_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Builds the summary block.
pub fn summary_lines(summary: &RunSummary, ctx: &RunContext<'_>) -> Vec<String> {
    let mut lines = vec![
        "Download Summary:".to_string(),
        format!("CSV file: {}", ctx.csv.display()),
        format!("Output directory: {}", display_path(ctx.output_dir).display()),
        format!("Dry run mode: {}", if ctx.dry_run { "Yes" } else { "No" }),
        String::new(),
        format!("Total files processed: {}", summary.total_files),
        format!("Downloaded successfully: {}", summary.downloaded),
        format!("Skipped (already downloaded): {}", summary.skipped_already_logged),
        format!("Skipped (exists in output): {}", summary.skipped_exists_output),
        format!("Skipped (found in local dir): {}", summary.skipped_exists_local),
        format!("Skipped (dry run): {}", summary.skipped_dry_run),
    ];
    if summary.failed > 0 {
        lines.push(format!("Failed: {}", summary.failed));
    }
    if summary.interrupted {
        let remaining = summary.total_files.saturating_sub(summary.processed());
        lines.push(format!("Not processed (interrupted): {remaining}"));
    }
    lines
}

/// Prints the summary, the optional hint block and the diagnostic log path.
pub fn print_run_report(summary: &RunSummary, ctx: &RunContext<'_>, detailed_log: &Path) {
    if summary.interrupted {
        println!();
        println!("{INTERRUPTED_MESSAGE}");
    }

    println!();
    for line in summary_lines(summary, ctx) {
        println!("{line}");
    }

    if summary.needs_hint(ctx.dry_run) && !summary.interrupted {
        println!();
        for line in NO_DOWNLOADS_HINT {
            println!("{line}");
        }
    }

    println!();
    println!(
        "Detailed log has been saved to: {}",
        display_path(detailed_log).display()
    );
}
