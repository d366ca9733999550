//! Error types for the refmirror library.

use thiserror::Error;

/// Errors that can occur while mirroring the catalog.
#[derive(Error, Debug)]
pub enum Error {
    /// A catalog record or listing field that must be numeric is not.
    #[error("line {line}: `{column}` is not a number: {value:?}")]
    Parse {
        /// 1-based line number in the parsed text.
        line: usize,
        /// Name of the offending column.
        column: &'static str,
        /// The raw text that failed to parse.
        value: String,
    },

    /// The login form did not carry a `form_build_id` token.
    #[error("login form token not found")]
    MissingToken,

    /// A request answered with a status code the flow cannot continue from.
    #[error("unexpected response code {code} from {url}")]
    UnexpectedResponseCode {
        /// The requested URL.
        url: String,
        /// The HTTP status code received.
        code: u16,
    },

    /// An artifact request returned something other than an octet stream.
    #[error("artifact {filename} is not binary (content type: {content_type})")]
    ArtifactNotBinary {
        /// The artifact filename that was requested.
        filename: String,
        /// The content type the server answered with.
        content_type: String,
    },

    /// A caller passed arguments that violate an API contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A resolved filename cannot be used as a local file name.
    #[error("invalid artifact filename: {0:?}")]
    InvalidFilename(String),

    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// A target URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for refmirror operations.
pub type Result<T> = std::result::Result<T, Error>;
