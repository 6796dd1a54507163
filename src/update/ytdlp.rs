//! yt-dlp binary update job.
//!
//! The downloader is a single executable at a fixed path. It has no staging
//! step: the new file replaces the old one in place, so a successful install
//! returns the flow to idle instead of asking for a restart.

use crate::error::{Result, UpdateError};
use crate::paths::{UpdatePaths, ytdlp_asset_name};
use crate::update::flow::{AvailableUpdate, FlowState, JobContext, JobOutcome, UpdateJob};
use crate::update::http::HttpClient;
use crate::update::installer::BinaryInstaller;
use crate::update::release::{AssetRule, Channel, ReleaseResolver, versions_match};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which yt-dlp build stream to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YtDlpBranch {
    /// Tagged releases.
    #[default]
    Stable,
    /// Nightly builds.
    Nightly,
    /// Builds from every master commit.
    Master,
}

impl YtDlpBranch {
    /// GitHub repository publishing this branch.
    pub fn repo(self) -> &'static str {
        match self {
            Self::Stable => "yt-dlp/yt-dlp",
            Self::Nightly => "yt-dlp/yt-dlp-nightly-builds",
            Self::Master => "yt-dlp/yt-dlp-master-builds",
        }
    }
}

impl std::fmt::Display for YtDlpBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Nightly => write!(f, "nightly"),
            Self::Master => write!(f, "master"),
        }
    }
}

/// Ask the binary at `path` for its version (`<path> --version`).
///
/// Returns the first whitespace-separated token of stdout, or `None` when the
/// binary is missing, fails to run, or prints nothing.
pub fn probe_binary_version(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    let output = quiet_command(path).arg("--version").output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .split_whitespace()
            .next()
            .map(str::to_owned),
        Ok(out) => {
            debug!("{} --version exited with {}", path.display(), out.status);
            None
        }
        Err(e) => {
            debug!("cannot run {}: {e}", path.display());
            None
        }
    }
}

/// Clear the downloader's cache after an update. Best-effort.
pub fn clear_binary_cache(path: &Path) {
    match quiet_command(path).arg("--rm-cache-dir").output() {
        Ok(out) if out.status.success() => debug!("cleared yt-dlp cache"),
        Ok(out) => warn!("yt-dlp --rm-cache-dir exited with {}", out.status),
        Err(e) => warn!("cannot clear yt-dlp cache: {e}"),
    }
}

fn quiet_command(path: &Path) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(path);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Checks and replaces the yt-dlp binary.
pub struct YtDlpUpdateJob {
    resolver: ReleaseResolver,
    installer: BinaryInstaller,
    branch: YtDlpBranch,
}

impl YtDlpUpdateJob {
    /// Job following `branch`, installing to `paths.ytdlp_binary`.
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_base: &str,
        branch: YtDlpBranch,
        paths: &UpdatePaths,
    ) -> Self {
        Self {
            resolver: ReleaseResolver::new(
                Arc::clone(&http),
                api_base,
                branch.repo(),
                AssetRule::Exact(ytdlp_asset_name().to_owned()),
            ),
            installer: BinaryInstaller::new(http, paths),
            branch,
        }
    }

    /// Installed binary path.
    pub fn binary(&self) -> &Path {
        self.installer.target()
    }

    fn check(
        &self,
        current: Option<String>,
        latest: Option<(String, String)>,
        ctx: &JobContext,
    ) -> JobOutcome {
        match (current, latest) {
            (Some(cur), Some((latest, _))) if versions_match(&cur, &latest) => {
                ctx.status(format!("yt-dlp binary up-to-date ({cur})"));
                JobOutcome::UpToDate { version: cur }
            }
            (current, Some((latest, changelog))) => {
                match &current {
                    Some(cur) => ctx.status(format!("yt-dlp binary current {cur}; latest {latest}")),
                    None => ctx.status("yt-dlp binary not installed"),
                }
                let update = AvailableUpdate {
                    remote: latest,
                    local: current.unwrap_or_default(),
                    changelog,
                };
                ctx.available(update.clone());
                JobOutcome::Available(update)
            }
            (Some(cur), None) => {
                ctx.status(format!("yt-dlp binary current {cur}; latest unknown"));
                JobOutcome::Unresolved(format!("latest {} yt-dlp version unknown", self.branch))
            }
            (None, None) => {
                ctx.status("yt-dlp binary not installed");
                JobOutcome::Unresolved(format!("latest {} yt-dlp version unknown", self.branch))
            }
        }
    }
}

impl UpdateJob for YtDlpUpdateJob {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn run(&self, do_install: bool, ctx: &JobContext) -> Result<JobOutcome> {
        ctx.status(format!("Checking for yt-dlp updates ({})...", self.branch));
        let current = probe_binary_version(self.binary());

        let mut report = |line: String| ctx.status(line);
        let release = self.resolver.resolve(Channel::Stable, &mut report);
        ctx.cancel_token().check()?;

        if !do_install {
            let latest = release
                .map(|r| (r.version, r.changelog.unwrap_or_default()));
            return Ok(self.check(current, latest, ctx));
        }

        let Some(release) = release else {
            return Ok(JobOutcome::Unresolved(format!(
                "cannot resolve yt-dlp download from {}",
                self.resolver.repo()
            )));
        };
        if let Some(cur) = current
            && versions_match(&cur, &release.version)
        {
            ctx.status("yt-dlp is up-to-date.");
            return Ok(JobOutcome::UpToDate { version: cur });
        }

        let asset = release
            .asset
            .as_ref()
            .ok_or_else(|| UpdateError::NoAsset(release.tag.clone()))?;

        ctx.phase(FlowState::Downloading);
        let label = "Downloading yt-dlp binary...";
        ctx.status(label);
        let mut progress = ctx.download_progress(label);
        self.installer
            .download(asset, ctx.cancel_token(), &mut progress)?;

        ctx.phase(FlowState::Verifying);
        self.installer.verify(asset)?;

        ctx.phase(FlowState::Applying);
        self.installer.replace()?;
        ctx.status("yt-dlp updated.");
        clear_binary_cache(self.binary());

        Ok(JobOutcome::Installed {
            version: release.version,
        })
    }
}
