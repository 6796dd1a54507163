//! Error types for the update core.

/// Failure of a single HTTP request against the release host.
///
/// Rate limiting and missing resources are kept apart from generic failures so
/// status reporting can tell the user *why* a check went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    /// The host refused the request with HTTP 403 (GitHub API rate limit).
    #[error("GitHub API rate limited (403) for {url}")]
    RateLimited {
        /// Requested URL.
        url: String,
    },

    /// The host answered HTTP 404.
    #[error("Not found (404) for {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// Any other non-2xx status.
    #[error("HTTP {code} for {url}")]
    Status {
        /// Status code.
        code: u16,
        /// Requested URL.
        url: String,
    },

    /// Connection, TLS, timeout or body read failure.
    #[error("network error: {0}")]
    Transport(String),
}

/// Top-level error type for checking, downloading and applying updates.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Release host request failed.
    #[error("{0}")]
    Http(#[from] HttpError),

    /// No release could be resolved for the requested channel.
    #[error("could not determine latest version: {0}")]
    Resolve(String),

    /// The resolved release carries no installable asset.
    #[error("no installable asset found in release {0}")]
    NoAsset(String),

    /// Asset download failed or was truncated.
    #[error("download failed: {0}")]
    Download(String),

    /// Archive could not be read or extracted.
    #[error("archive error: {0}")]
    Archive(String),

    /// Filesystem replacement or staging failed.
    #[error("install error: {0}")]
    Install(String),

    /// The run was canceled by the caller.
    #[error("update canceled")]
    Canceled,

    /// Worker thread could not be spawned or died unexpectedly.
    #[error("worker error: {0}")]
    Worker(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
