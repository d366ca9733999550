//! The full mirroring pipeline.
//!
//! One run loads the catalog, scrapes the listing page for unknown entries,
//! logs in only if something needs fetching, downloads the work set, and
//! then always saves the catalog and logs out, whichever way the run ended.

use crate::catalog::Catalog;
use crate::config::{AppConfig, Credentials, PASSWORD_ENV, USER_ENV};
use crate::download::{DownloadProgress, Downloader};
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::scraper;
use crate::session::Session;
use crate::stats::{RunStats, RunStatsBuilder};

/// Runs the pipeline against one configured site.
pub struct Mirror {
    config: AppConfig,
    downloader: Downloader,
}

impl Mirror {
    /// Creates a mirror for `config`.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let downloader = Downloader::new(config.site.clone(), config.paths.clone());
        Self { config, downloader }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs once.
    ///
    /// `credentials` are needed only when there is something to download.
    /// The catalog is written back and an active session logged out before
    /// this returns, also when it returns an error; filenames resolved before
    /// a failure are therefore kept. A login form without its token ends the
    /// download phase early without failing the run (see [`RunStats::aborted`]).
    ///
    /// # Errors
    ///
    /// Returns the first error of the run: a malformed catalog file (before
    /// any request is made), a missing credential, an unexpected response
    /// code, or a transport or I/O failure. Save and logout failures are
    /// returned only when nothing failed earlier.
    pub async fn run(
        &self,
        credentials: Option<&Credentials>,
        progress: &dyn DownloadProgress,
    ) -> Result<RunStats> {
        let catalog_file = &self.config.paths.catalog_file;
        let mut catalog = Catalog::load(catalog_file)?;

        let mut transport = Transport::new(&self.config.site.base_url, self.config.transport.clone())?;
        let mut session = Session::new(&self.config.site);
        let mut stats = RunStatsBuilder::new();

        let outcome = self
            .sync(
                &mut transport,
                &mut session,
                &mut catalog,
                credentials,
                progress,
                &mut stats,
            )
            .await;

        let saved = catalog.save(catalog_file);
        if let Err(e) = &saved {
            log::error!("Failed to save {}: {e}", catalog_file.display());
        }
        let logged_out = session.logout(&mut transport).await;
        if let Err(e) = &logged_out {
            log::error!("Logout failed: {e}");
        }

        outcome.and(saved).and(logged_out).map(|()| stats.build())
    }

    async fn sync(
        &self,
        transport: &mut Transport,
        session: &mut Session,
        catalog: &mut Catalog,
        credentials: Option<&Credentials>,
        progress: &dyn DownloadProgress,
        stats: &mut RunStatsBuilder,
    ) -> Result<()> {
        let mut listing = transport.action(&self.config.site.listing_path)?.get().await?;
        log::info!("{} {}", listing.code(), listing.title().await?);
        let found = scraper::find_new_entries(listing.html().await?.unwrap_or_default(), catalog)?;

        let new_ids: Vec<u32> = found.iter().map(|e| e.id).collect();
        for entry in found {
            log::debug!("New entry {entry}");
            catalog.insert(entry);
        }

        let work = self.downloader.collect_work_set(catalog, &new_ids).await;
        stats.set_work_set(work.new_entries, work.missing_entries);
        log::info!("New entries: {}", work.new_entries);
        log::info!("Missing entries: {}", work.missing_entries);
        log::info!("Total: {}", work.len());

        if work.is_empty() {
            log::info!("No need to download.");
            return Ok(());
        }

        let credentials = credentials.ok_or_else(|| {
            Error::Config(format!(
                "{} entries to download but {USER_ENV}/{PASSWORD_ENV} are not set",
                work.len()
            ))
        })?;

        match session.login(transport, credentials).await {
            Ok(()) => {}
            Err(Error::MissingToken) => {
                log::error!("{}; download skipped", Error::MissingToken);
                stats.mark_aborted();
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        transport.set_follow_redirects(false)?;
        self.downloader
            .download_all(transport, catalog, &work, progress, stats)
            .await
    }
}
