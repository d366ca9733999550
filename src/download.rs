//! Work-set computation, filename resolution and artifact download.

use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::{PathConfig, SiteConfig};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::http::Transport;
use crate::stats::RunStatsBuilder;

/// Classification of an artifact's current state on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// The file exists and is not empty.
    Complete,
    /// The file is absent or has zero length.
    Missing,
}

/// Trait for receiving download progress updates.
///
/// All methods have default no-op implementations.
pub trait DownloadProgress: Send + Sync {
    /// Called once before the first entry with the work-set size.
    fn on_start(&self, _total: usize) {}

    /// Called when processing of an entry begins.
    fn on_entry_start(&self, _entry: &CatalogEntry) {}

    /// Called when an artifact was already present and not fetched.
    fn on_skip(&self, _filename: &str) {}

    /// Called after an artifact was written.
    fn on_saved(&self, _filename: &str, _bytes: u64) {}

    /// Called when an artifact request returned a page, saved at `fallback`.
    fn on_deflected(&self, _filename: &str, _fallback: &Path) {}

    /// Called when processing of an entry finishes.
    fn on_entry_done(&self, _entry: &CatalogEntry) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Entries that need their artifact fetched this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkSet {
    /// Entry ids in ascending `number` order.
    pub ids: Vec<u32>,
    /// How many of them were just discovered on the listing page.
    pub new_entries: usize,
    /// How many of them were known but unresolved, missing or empty.
    pub missing_entries: usize,
}

impl WorkSet {
    /// Returns true if nothing needs downloading.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of entries to process.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// What happened to one entry's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A non-empty file was already at the destination.
    Skipped,
    /// The artifact was written.
    Saved {
        /// Bytes written.
        bytes: u64,
    },
    /// A page came back instead of the artifact and was saved here.
    Deflected {
        /// Where the page was written.
        fallback: PathBuf,
    },
}

/// Turns a resolution redirect target into an artifact filename.
///
/// The query string is dropped, the remainder URL-decoded, and everything
/// after the last `/` kept.
///
/// # Errors
///
/// Returns [`Error::InvalidFilename`] if the result is empty, a dot entry,
/// contains a path separator, or is not valid UTF-8 once decoded.
pub fn filename_from_location(location: &str) -> Result<String> {
    let raw = location.split(['?', '#']).next().unwrap_or_default();
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced)
        .map_err(|_| Error::InvalidFilename(location.to_string()))?;
    let filename = decoded.rsplit('/').next().unwrap_or_default();
    if filename.is_empty() || filename == "." || filename == ".." || filename.contains('\\') {
        return Err(Error::InvalidFilename(location.to_string()));
    }
    Ok(filename.to_string())
}

/// Resolves and fetches artifacts for catalog entries.
pub struct Downloader<F: FileSystem = TokioFileSystem> {
    site: SiteConfig,
    paths: PathConfig,
    fs: F,
}

impl Downloader<TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub const fn new(site: SiteConfig, paths: PathConfig) -> Self {
        Self {
            site,
            paths,
            fs: TokioFileSystem,
        }
    }
}

impl<F: FileSystem> Downloader<F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(site: SiteConfig, paths: PathConfig, fs: F) -> Self {
        Self { site, paths, fs }
    }

    /// Returns the local path configuration.
    #[must_use]
    pub const fn paths(&self) -> &PathConfig {
        &self.paths
    }

    /// Classifies an artifact's current status on disk.
    async fn classify_file(&self, filename: &str) -> FileStatus {
        match self.fs.file_size(&self.paths.artifact_path(filename)).await {
            Some(size) if size > 0 => FileStatus::Complete,
            _ => FileStatus::Missing,
        }
    }

    /// Returns true if the entry's filename is unknown or its file is missing or empty.
    pub async fn needs_download(&self, entry: &CatalogEntry) -> bool {
        match entry.filename() {
            None => true,
            Some(filename) => self.classify_file(filename).await == FileStatus::Missing,
        }
    }

    /// Computes the work set: every id in `new_ids` plus every other entry
    /// that [needs download](Self::needs_download), ordered by `number`.
    pub async fn collect_work_set(&self, catalog: &Catalog, new_ids: &[u32]) -> WorkSet {
        let mut selected: Vec<&CatalogEntry> = Vec::new();
        let mut missing_entries = 0;

        for entry in catalog {
            if new_ids.contains(&entry.id) {
                selected.push(entry);
            } else if self.needs_download(entry).await {
                missing_entries += 1;
                selected.push(entry);
            }
        }

        selected.sort_by_key(|e| e.number);
        WorkSet {
            ids: selected.iter().map(|e| e.id).collect(),
            new_entries: selected.len() - missing_entries,
            missing_entries,
        }
    }

    /// Asks the site where an entry's artifact lives.
    ///
    /// The transport must not follow redirects: only a 302 answer is accepted
    /// and its `Location` names the artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedResponseCode`] for any other code,
    /// [`Error::InvalidFilename`] if the redirect target is unusable, or a
    /// transport error.
    pub async fn resolve_filename(&self, transport: &Transport, id: u32) -> Result<String> {
        let mut exchange = transport.action(&self.site.resolve_link(id))?.get().await?;
        let code = exchange.code();
        if code == 200 {
            log::info!("{}", exchange.title().await?);
        }
        if code != 302 {
            return Err(Error::UnexpectedResponseCode {
                url: exchange.meta().url().to_string(),
                code,
            });
        }
        let location = exchange
            .header("Location")
            .ok_or_else(|| Error::InvalidFilename(String::new()))?;
        filename_from_location(location)
    }

    /// Fetches an artifact and writes it to the output directory.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactNotBinary`] after saving the page to the
    /// fallback location when the answer is not an octet stream; transport
    /// and I/O errors otherwise.
    pub async fn fetch_artifact(&self, transport: &Transport, filename: &str) -> Result<u64> {
        let mut exchange = transport
            .action_url(self.site.artifact_link(filename)?)
            .get()
            .await?;

        if let Some(data) = exchange.binary().await? {
            self.fs.create_dir_all(&self.paths.output_dir).await?;
            self.fs
                .write_atomic(&self.paths.artifact_path(filename), data)
                .await?;
            return Ok(data.len() as u64);
        }

        log::warn!("{} {}", exchange.code(), exchange.title().await?);
        let content_type = exchange
            .meta()
            .content_type()
            .unwrap_or("none")
            .to_string();
        let page = exchange.html().await?.unwrap_or_default();
        let fallback = self.paths.fallback_path(filename);
        if let Some(parent) = fallback.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent).await?;
        }
        self.fs.write_file(&fallback, page.as_bytes()).await?;

        Err(Error::ArtifactNotBinary {
            filename: filename.to_string(),
            content_type,
        })
    }

    /// Resolves (if needed) and fetches (if missing) one entry's artifact.
    ///
    /// A resolved filename is attached to `entry` before anything is fetched,
    /// so it is kept even when the fetch fails.
    ///
    /// # Errors
    ///
    /// Resolution failures and transport/I/O errors. A page returned instead
    /// of the artifact is not an error here; see [`FetchOutcome::Deflected`].
    pub async fn process_entry(
        &self,
        transport: &Transport,
        entry: &mut CatalogEntry,
        stats: &mut RunStatsBuilder,
    ) -> Result<FetchOutcome> {
        let filename = match entry.filename() {
            Some(f) => f.to_string(),
            None => {
                let f = self.resolve_filename(transport, entry.id).await?;
                entry.attach_filename(f.clone());
                stats.add_resolved();
                f
            }
        };

        if self.classify_file(&filename).await == FileStatus::Complete {
            log::info!("[{filename}] skip");
            return Ok(FetchOutcome::Skipped);
        }

        match self.fetch_artifact(transport, &filename).await {
            Ok(bytes) => {
                log::info!("[{filename}] done");
                Ok(FetchOutcome::Saved { bytes })
            }
            Err(e @ Error::ArtifactNotBinary { .. }) => {
                let fallback = self.paths.fallback_path(&filename);
                log::error!("{e}; page saved to {}", fallback.display());
                Ok(FetchOutcome::Deflected { fallback })
            }
            Err(e) => Err(e),
        }
    }

    /// Processes every entry of the work set in order.
    ///
    /// Stops at the first error other than a deflected artifact. Filenames
    /// resolved up to that point stay attached to their catalog entries.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`process_entry`](Self::process_entry).
    pub async fn download_all(
        &self,
        transport: &Transport,
        catalog: &mut Catalog,
        work: &WorkSet,
        progress: &dyn DownloadProgress,
        stats: &mut RunStatsBuilder,
    ) -> Result<()> {
        progress.on_start(work.len());

        for &id in &work.ids {
            let Some(entry) = catalog.get_mut(id) else {
                log::warn!("Entry {id} vanished from the catalog");
                continue;
            };

            log::info!("Downloading [{}] [{}]", entry.number, entry.title);
            progress.on_entry_start(entry);

            let outcome = self.process_entry(transport, entry, stats).await?;
            let filename = entry.filename().unwrap_or_default();
            match outcome {
                FetchOutcome::Skipped => {
                    stats.add_skipped();
                    progress.on_skip(filename);
                }
                FetchOutcome::Saved { bytes } => {
                    stats.add_download(bytes);
                    progress.on_saved(filename, bytes);
                }
                FetchOutcome::Deflected { fallback } => {
                    stats.add_deflected();
                    progress.on_deflected(filename, &fallback);
                }
            }

            log::info!("Download done [{}] [{}].", entry.number, entry.title);
            progress.on_entry_done(entry);
        }

        Ok(())
    }
}
