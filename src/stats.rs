//! Run statistics.

use std::time::{Duration, Instant};

/// What one mirroring run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Entries found on the listing page that were not in the catalog.
    pub new_entries: usize,
    /// Known entries whose artifact was unresolved, missing or empty.
    pub missing_entries: usize,
    /// Filenames learned through the resolution redirect.
    pub resolved: usize,
    /// Artifacts written to the output directory.
    pub downloaded: usize,
    /// Entries whose artifact was already on disk.
    pub skipped: usize,
    /// Artifact requests answered with a page instead of a file.
    pub deflected: usize,
    /// Bytes written for downloaded artifacts.
    pub total_bytes: u64,
    /// Whether the download phase was abandoned before it started.
    pub aborted: bool,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    /// Creates empty run statistics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            new_entries: 0,
            missing_entries: 0,
            resolved: 0,
            downloaded: 0,
            skipped: 0,
            deflected: 0,
            total_bytes: 0,
            aborted: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Size of the work set.
    #[must_use]
    pub const fn work_set(&self) -> usize {
        self.new_entries + self.missing_entries
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Accumulates [`RunStats`] while a run progresses.
#[derive(Debug)]
pub struct RunStatsBuilder {
    stats: RunStats,
    start_time: Instant,
}

impl Default for RunStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatsBuilder {
    /// Starts the clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: RunStats::new(),
            start_time: Instant::now(),
        }
    }

    /// Records the work-set composition.
    pub const fn set_work_set(&mut self, new_entries: usize, missing_entries: usize) {
        self.stats.new_entries = new_entries;
        self.stats.missing_entries = missing_entries;
    }

    /// Records a filename learned through resolution.
    pub const fn add_resolved(&mut self) {
        self.stats.resolved += 1;
    }

    /// Records a written artifact.
    pub const fn add_download(&mut self, bytes: u64) {
        self.stats.downloaded += 1;
        self.stats.total_bytes += bytes;
    }

    /// Records an artifact already on disk.
    pub const fn add_skipped(&mut self) {
        self.stats.skipped += 1;
    }

    /// Records an artifact request that returned a page.
    pub const fn add_deflected(&mut self) {
        self.stats.deflected += 1;
    }

    /// Marks the download phase as abandoned.
    pub const fn mark_aborted(&mut self) {
        self.stats.aborted = true;
    }

    /// Builds the final statistics.
    #[must_use]
    pub fn build(self) -> RunStats {
        RunStats {
            elapsed: self.start_time.elapsed(),
            ..self.stats
        }
    }
}
