//! Configuration types for the updater.

use crate::error::{Result, UpdateError};
use crate::paths::{UpdatePaths, default_install_root};
use crate::update::http::{DEFAULT_USER_AGENT, UreqClient};
use crate::update::release::{Channel, DEFAULT_API_BASE};
use crate::update::schedule::{UpdateAction, UpdateCadence, UpdateSchedule};
use crate::update::ytdlp::YtDlpBranch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default application repository.
pub const DEFAULT_APP_REPO: &str = "YoutubeConverter/YoutubeConverter";

/// Top-level updater configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Application self-update settings.
    pub app: AppUpdateConfig,
    /// Downloader binary settings.
    pub ytdlp: YtDlpUpdateConfig,
    /// Filesystem overrides.
    pub paths: PathsConfig,
    /// Release host access.
    pub http: HttpConfig,
}

/// Application update settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppUpdateConfig {
    /// GitHub repository (`owner/name`).
    pub repo: String,
    /// Release channel to follow.
    pub channel: Channel,
    /// What to do when a newer version is found.
    pub action: UpdateAction,
    /// Check cadence and last check time.
    pub schedule: UpdateSchedule,
}

impl Default for AppUpdateConfig {
    fn default() -> Self {
        Self {
            repo: DEFAULT_APP_REPO.to_owned(),
            channel: Channel::Stable,
            action: UpdateAction::Prompt,
            schedule: UpdateSchedule::new(UpdateCadence::Launch),
        }
    }
}

/// Downloader binary update settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpUpdateConfig {
    /// Auto-update the binary when its schedule is due.
    pub enabled: bool,
    /// Build stream to follow.
    pub branch: YtDlpBranch,
    /// Check cadence and last check time.
    pub schedule: UpdateSchedule,
}

impl Default for YtDlpUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            branch: YtDlpBranch::Stable,
            schedule: UpdateSchedule::new(UpdateCadence::Daily),
        }
    }
}

/// Optional path overrides. Unset fields use the standard layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Installation root (default: directory of the running executable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_root: Option<PathBuf>,
    /// Downloader binary location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ytdlp_binary: Option<PathBuf>,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// REST API root; point at a mock server in tests.
    pub api_base: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-read timeout in seconds.
    pub read_timeout_secs: u64,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            connect_timeout_secs: 15,
            read_timeout_secs: 60,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| UpdateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| UpdateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// A present but unreadable or malformed file is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("no config at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Returns the default config file path (see [`crate::paths::config_file`]).
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_file()
    }

    /// Resolve on-disk locations, applying overrides.
    pub fn paths(&self) -> UpdatePaths {
        let root = self
            .paths
            .install_root
            .clone()
            .unwrap_or_else(default_install_root);
        let paths = UpdatePaths::from_root(root);
        match &self.paths.ytdlp_binary {
            Some(bin) => paths.with_ytdlp_binary(bin),
            None => paths,
        }
    }

    /// HTTP client built from the `[http]` section.
    pub fn http_client(&self) -> UreqClient {
        UreqClient::new(
            Duration::from_secs(self.http.connect_timeout_secs),
            Duration::from_secs(self.http.read_timeout_secs),
            &self.http.user_agent,
        )
    }
}
