//! Progress bar and summary reporting for console runs.

use console::style;
use indicatif::ProgressStyle;

use crate::{RunStats, format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Style of the bar counting processed entries of the work set.
pub fn entry_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .expect("progress template is valid")
        .progress_chars("━━╌")
}

/// Prints a summary of the run.
pub fn print_summary(stats: &RunStats) {
    println!("\n{SEPARATOR}");
    println!("Mirror Summary");
    println!("{SEPARATOR}");

    println!("  New entries:       {}", stats.new_entries);
    println!("  Missing entries:   {}", stats.missing_entries);

    if stats.aborted {
        println!(
            "  {}",
            style("Download phase aborted (no login form token)").yellow()
        );
    }
    if stats.resolved > 0 {
        println!("  Resolved:          {}", stats.resolved);
    }
    if stats.downloaded > 0 {
        println!("  Downloaded:        {}", stats.downloaded);
        println!("  Total size:        {}", format_bytes(stats.total_bytes));
        println!(
            "  Average speed:     {}/s",
            format_bytes(stats.average_speed())
        );
    }
    if stats.skipped > 0 {
        println!("  Skipped:           {}", stats.skipped);
    }
    if stats.deflected > 0 {
        println!(
            "  {}",
            style(format!("Deflected to .htm: {}", stats.deflected)).red()
        );
    }

    println!("  Total time:        {}", format_duration(stats.elapsed));
    println!("{SEPARATOR}");
}
