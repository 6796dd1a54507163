//! Filesystem locations touched by the updater.
//!
//! Nothing here is computed at import time. [`UpdatePaths`] is built once at
//! startup (usually from [`crate::config::UpdaterConfig::paths`]) and handed to
//! the resolver and installers, so tests can point everything at a temp dir.
//!
//! # Layout
//!
//! | Purpose | Path |
//! |---------|------|
//! | Installation root | directory of the running executable |
//! | Staging | `<root>/_update_staging/` |
//! | Pending marker | `<root>/_update_staging/.pending` |
//! | yt-dlp binary | `<root>/yt-dlp-bin/yt-dlp[.exe]` |
//! | Config | `dirs::config_dir()/YoutubeConverter/updater.toml` |
//!
//! # Environment Overrides
//!
//! - `YTCONV_INSTALL_DIR` overrides [`default_install_root`]
//! - `YTCONV_CONFIG_DIR` overrides [`config_dir`]

use std::path::{Path, PathBuf};

/// Name of the staging subdirectory under the installation root.
pub const STAGING_DIR_NAME: &str = "_update_staging";

/// One-line marker recording the version waiting in staging.
pub const PENDING_MARKER: &str = ".pending";

/// Temp file the application archive is downloaded into (inside staging).
pub const STAGING_DOWNLOAD: &str = "_update_tmp.zip";

/// Directory holding the bundled downloader binary.
pub const YTDLP_DIR_NAME: &str = "yt-dlp-bin";

/// Local version file shipped at the installation root.
pub const VERSION_FILE: &str = "version.txt";

/// Platform file name of the downloader binary.
pub fn ytdlp_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

/// Release asset name of the downloader binary for this platform.
pub fn ytdlp_asset_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "yt-dlp_macos"
    } else {
        "yt-dlp"
    }
}

/// Config directory for the updater.
///
/// Resolves to `dirs::config_dir()/YoutubeConverter/`. Override with the
/// `YTCONV_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("YTCONV_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("YoutubeConverter"))
        .unwrap_or_else(|| PathBuf::from("/tmp/ytconv-config"))
}

/// Updater config file path (`config_dir()/updater.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("updater.toml")
}

/// Default installation root: the directory of the running executable.
///
/// Override with the `YTCONV_INSTALL_DIR` environment variable.
#[must_use]
pub fn default_install_root() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("YTCONV_INSTALL_DIR") {
        return PathBuf::from(override_dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolved on-disk locations for both update flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePaths {
    /// Root of the live application installation.
    pub install_root: PathBuf,
    /// Staging directory for a pending application update.
    pub staging_dir: PathBuf,
    /// Fixed path of the downloader binary.
    pub ytdlp_binary: PathBuf,
}

impl UpdatePaths {
    /// Derive the standard layout from an installation root.
    pub fn from_root(install_root: impl Into<PathBuf>) -> Self {
        let install_root = install_root.into();
        Self {
            staging_dir: install_root.join(STAGING_DIR_NAME),
            ytdlp_binary: install_root.join(YTDLP_DIR_NAME).join(ytdlp_binary_name()),
            install_root,
        }
    }

    /// Replace the downloader binary location.
    pub fn with_ytdlp_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.ytdlp_binary = path.into();
        self
    }

    /// Path of the pending-version marker inside staging.
    pub fn pending_marker(&self) -> PathBuf {
        self.staging_dir.join(PENDING_MARKER)
    }

    /// Path the application archive is downloaded to.
    pub fn staging_download(&self) -> PathBuf {
        self.staging_dir.join(STAGING_DOWNLOAD)
    }

    /// Temp path next to the downloader binary used during replacement.
    pub fn ytdlp_temp(&self) -> PathBuf {
        let mut name = self
            .ytdlp_binary
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ytdlp_binary_name().into());
        name.push(".tmp");
        self.ytdlp_binary.with_file_name(name)
    }

    /// Path of the local `version.txt`.
    pub fn version_file(&self) -> PathBuf {
        self.install_root.join(VERSION_FILE)
    }
}
