//! Application self-update job.
//!
//! Resolves the configured channel, compares it with the installed version
//! and, when installing, stages the release archive for apply-on-restart.

use crate::error::{Result, UpdateError};
use crate::paths::UpdatePaths;
use crate::update::flow::{AvailableUpdate, FlowState, JobContext, JobOutcome, UpdateJob};
use crate::update::http::HttpClient;
use crate::update::installer::AppStager;
use crate::update::release::{
    AssetRule, Channel, ReleaseResolver, normalize_version, versions_match,
};
use std::sync::Arc;

/// Version compiled into this build.
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installed application version.
///
/// Reads `version.txt` in the installation root, falling back to `fallback`
/// when the file is missing or blank.
pub fn local_app_version(paths: &UpdatePaths, fallback: &str) -> String {
    std::fs::read_to_string(paths.version_file())
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_owned())
}

/// Checks and stages application updates.
pub struct AppUpdateJob {
    resolver: ReleaseResolver,
    channel: Channel,
    stager: AppStager,
    local_version: String,
}

impl AppUpdateJob {
    /// Job for `repo` on `channel`, staging into `paths`.
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_base: &str,
        repo: &str,
        channel: Channel,
        paths: UpdatePaths,
    ) -> Self {
        let local_version = local_app_version(&paths, BUILD_VERSION);
        Self {
            resolver: ReleaseResolver::new(
                Arc::clone(&http),
                api_base,
                repo,
                AssetRule::app_archive(),
            ),
            channel,
            stager: AppStager::new(http, paths),
            local_version,
        }
    }

    /// Override the detected local version.
    pub fn with_local_version(mut self, version: impl Into<String>) -> Self {
        self.local_version = version.into();
        self
    }

    /// Version the job compares against.
    pub fn local_version(&self) -> &str {
        &self.local_version
    }
}

impl UpdateJob for AppUpdateJob {
    fn name(&self) -> &str {
        "app"
    }

    fn run(&self, do_install: bool, ctx: &JobContext) -> Result<JobOutcome> {
        let repo = self.resolver.repo();
        let channel = self.channel;
        ctx.status(format!("Checking app updates from {repo}..."));

        let mut report = |line: String| ctx.status(line);
        let Some(release) = self.resolver.resolve(channel, &mut report) else {
            return Ok(JobOutcome::Unresolved(format!(
                "no {channel} release found for {repo}"
            )));
        };
        ctx.cancel_token().check()?;

        let local = self.local_version.as_str();
        if versions_match(&release.version, local) {
            ctx.status(format!("App up-to-date ({local}) [{channel}]"));
            return Ok(JobOutcome::UpToDate {
                version: local.to_owned(),
            });
        }

        if !do_install {
            ctx.status(format!(
                "Update available {local} -> {} [{channel}]",
                release.version
            ));
            let update = AvailableUpdate {
                remote: release.version.clone(),
                local: local.to_owned(),
                changelog: release.changelog.clone().unwrap_or_default(),
            };
            ctx.available(update.clone());
            return Ok(JobOutcome::Available(update));
        }

        let asset = release
            .asset
            .as_ref()
            .ok_or_else(|| UpdateError::NoAsset(release.tag.clone()))?;

        ctx.phase(FlowState::Downloading);
        let label = format!("Downloading {}...", asset.name);
        ctx.status(label.clone());
        let mut progress = ctx.download_progress(&label);
        self.stager
            .download(asset, ctx.cancel_token(), &mut progress)?;

        ctx.phase(FlowState::Verifying);
        ctx.status("Preparing update...");
        let version = normalize_version(&release.version);
        self.stager.stage(&version, ctx.cancel_token())?;

        ctx.status("Update ready. It will be applied on restart.");
        Ok(JobOutcome::Staged { version })
    }
}
