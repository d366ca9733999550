//! Configuration types for mirroring runs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the site account name.
pub const USER_ENV: &str = "REFMIRROR_USER";
/// Environment variable holding the site account password.
pub const PASSWORD_ENV: &str = "REFMIRROR_PASSWORD";

/// Forward HTTP proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy host name.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "proxygate2.nic.nec.co.jp".to_string(),
            port: 8080,
        }
    }
}

impl ProxyConfig {
    /// Returns the proxy as an `http://host:port` URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Settings applied when building the HTTP transport.
///
/// These replace process-wide switches: every [`Transport`](crate::http::Transport)
/// is built from one of these and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Whether 3xx responses are followed automatically.
    pub follow_redirects: bool,
    /// `User-Agent` header sent with each request.
    pub user_agent: String,
    /// Route every connection through this proxy when set.
    pub proxy: Option<ProxyConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            user_agent: format!("refmirror/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
        }
    }
}

impl TransportConfig {
    /// Sets the proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Sets whether redirects are followed.
    #[must_use]
    pub const fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }
}

/// Endpoints of the mirrored site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host that relative paths resolve against.
    pub base_url: String,
    /// Listing page carrying the embedded catalog script.
    pub listing_path: String,
    /// Login form page; the form is posted back to the same path.
    pub login_path: String,
    /// Path that ends the session.
    pub logout_path: String,
    /// Prefix of the per-id resolution link that redirects to the artifact.
    pub resolve_path: String,
    /// Absolute URL prefix for direct artifact downloads.
    pub cdn_base: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://refcardz.dzone.com".to_string(),
            listing_path: "/".to_string(),
            login_path: "/user".to_string(),
            logout_path: "/logout".to_string(),
            resolve_path: "/assets/request/refcard".to_string(),
            cdn_base: "http://cdn.dzone.com/sites/all/files/refcardz/".to_string(),
        }
    }
}

impl SiteConfig {
    /// Returns the resolution link for an entry id.
    #[must_use]
    pub fn resolve_link(&self, id: u32) -> String {
        format!(
            "{}/{id}?oid=rchom{id}&direct=true",
            self.resolve_path.trim_end_matches('/')
        )
    }

    /// Returns the direct download URL for an artifact filename.
    ///
    /// The filename becomes one path segment, so `%`, `?`, `#` and `/` in it
    /// are percent-encoded instead of changing the URL's structure.
    ///
    /// # Errors
    ///
    /// Returns an error if `cdn_base` is not an absolute hierarchical URL.
    pub fn artifact_link(&self, filename: &str) -> Result<Url> {
        let mut url = Url::parse(&self.cdn_base)?;
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("cdn_base cannot take a path: {}", self.cdn_base)))?
            .pop_if_empty()
            .push(filename);
        Ok(url)
    }
}

/// Local file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Persisted catalog (tab-separated records).
    pub catalog_file: PathBuf,
    /// Directory that receives downloaded artifacts.
    pub output_dir: PathBuf,
    /// Directory that receives `.htm` pages served in place of an artifact.
    pub fallback_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            catalog_file: PathBuf::from("refcardMap.csv"),
            output_dir: PathBuf::from("pdf"),
            fallback_dir: PathBuf::from("."),
        }
    }
}

impl PathConfig {
    /// Destination of an artifact inside the output directory.
    #[must_use]
    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Destination of the diagnostic page saved when an artifact fetch
    /// returns HTML. The artifact's extension is swapped for `.htm`.
    #[must_use]
    pub fn fallback_path(&self, filename: &str) -> PathBuf {
        self.fallback_dir
            .join(Path::new(filename).with_extension("htm"))
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote endpoints.
    pub site: SiteConfig,
    /// Local paths.
    pub paths: PathConfig,
    /// Transport settings.
    pub transport: TransportConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file: `$XDG_CONFIG_HOME/refmirror/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("refmirror")
            .join("config.toml")
    }

    /// Parses a TOML document; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML for this schema.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and built-in defaults are used when nothing is there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                log::info!("Loaded config from {}", path.display());
                Self::from_toml_str(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!("{}: {e}", path.display()))),
        }
    }

    /// Enables the proxy, keeping a configured endpoint or falling back to the default one.
    #[must_use]
    pub fn with_proxy_enabled(mut self) -> Self {
        if self.transport.proxy.is_none() {
            self.transport.proxy = Some(ProxyConfig::default());
        }
        self
    }

    /// Sets the artifact output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.output_dir = dir.into();
        self
    }

    /// Sets the catalog file.
    #[must_use]
    pub fn with_catalog_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.paths.catalog_file = file.into();
        self
    }
}

/// Account used to log into the site.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub name: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from plaintext values.
    #[must_use]
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }

    /// Reads credentials from `REFMIRROR_USER` and `REFMIRROR_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either variable is unset.
    pub fn from_env() -> Result<Self> {
        let name = std::env::var(USER_ENV)
            .map_err(|_| Error::Config(format!("{USER_ENV} environment variable not set")))?;
        let password = std::env::var(PASSWORD_ENV)
            .map_err(|_| Error::Config(format!("{PASSWORD_ENV} environment variable not set")))?;
        Ok(Self { name, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}
