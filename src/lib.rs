//! refmirror - keeps a local mirror of a document catalog.
//!
//! A run loads the persisted catalog, scrapes the site's listing page for
//! entries it does not know yet, and downloads the document of every entry
//! that is new or whose file is missing locally. Logging in happens only
//! when there is something to fetch. The catalog is always written back and
//! the session always closed, however the run ends.
//!
//! # Example
//!
//! ```no_run
//! use refmirror::{AppConfig, Credentials, Mirror, NoProgress};
//!
//! # async fn example() -> refmirror::Result<()> {
//! let config = AppConfig::load(None)?.with_output_dir("cards");
//! let credentials = Credentials::from_env().ok();
//!
//! let stats = Mirror::new(config)
//!     .run(credentials.as_ref(), &NoProgress)
//!     .await?;
//! println!("Downloaded {} documents", stats.downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod http;
pub mod mirror;
pub mod scraper;
pub mod session;
pub mod stats;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use catalog::{Catalog, CatalogEntry};
pub use config::{AppConfig, Credentials, PathConfig, ProxyConfig, SiteConfig, TransportConfig};
pub use download::{DownloadProgress, Downloader, FetchOutcome, NoProgress, WorkSet};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration};
pub use fs::{FileSystem, TokioFileSystem};
pub use http::{Exchange, Transport};
pub use mirror::Mirror;
pub use session::Session;
pub use stats::{RunStats, RunStatsBuilder};
