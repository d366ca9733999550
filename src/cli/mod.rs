//! CLI mode for refmirror: console progress and the run entry point.

mod progress;

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget};

use crate::{
    AppConfig, CatalogEntry, Credentials, DownloadProgress, Mirror, RunStats, format_bytes,
};

use progress::{entry_style, print_summary};

/// Reports entry-level progress on a terminal bar.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    /// Creates a hidden bar; it is shown once the work set is known.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Clears the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl DownloadProgress for ConsoleProgress {
    fn on_start(&self, total: usize) {
        self.bar.set_style(entry_style());
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(250));
    }

    fn on_entry_start(&self, entry: &CatalogEntry) {
        self.bar
            .set_message(format!("[{}] {}", entry.number, entry.title));
    }

    fn on_skip(&self, filename: &str) {
        self.bar.println(format!("  {filename} - already present"));
    }

    fn on_saved(&self, filename: &str, bytes: u64) {
        self.bar
            .println(format!("  {filename} - {}", format_bytes(bytes)));
    }

    fn on_deflected(&self, filename: &str, fallback: &Path) {
        self.bar.println(format!(
            "  {} - page saved to {}",
            style(filename).red(),
            fallback.display()
        ));
    }

    fn on_entry_done(&self, _entry: &CatalogEntry) {
        self.bar.inc(1);
    }
}

/// Runs one mirroring pass with console reporting.
///
/// Credentials are read from the environment; they are only needed when
/// something has to be downloaded.
///
/// # Errors
///
/// Returns the first error of the run after its cleanup completed.
pub async fn run(config: AppConfig) -> crate::Result<RunStats> {
    let credentials = Credentials::from_env().ok();
    let progress = ConsoleProgress::new();

    let result = Mirror::new(config)
        .run(credentials.as_ref(), &progress)
        .await;
    progress.finish();

    if let Ok(stats) = &result {
        print_summary(stats);
    }
    result
}
