//! GitHub release resolution.
//!
//! Maps a release channel to exactly one [`ReleaseDescriptor`]. Request
//! failures never propagate: each one is turned into a status line and the
//! resolver answers "no release found", so callers can tell "check failed"
//! apart from "up to date".

use crate::error::HttpError;
use crate::update::http::HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default GitHub REST API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Tag name of the rolling nightly release.
pub const NIGHTLY_TAG: &str = "nightly";

/// Release track to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Newest non-prerelease.
    #[default]
    #[serde(alias = "release")]
    Stable,
    /// Newest prerelease that is not the nightly.
    Prerelease,
    /// The release tagged `nightly`.
    Nightly,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "release"),
            Self::Prerelease => write!(f, "prerelease"),
            Self::Nightly => write!(f, "nightly"),
        }
    }
}

/// How to pick the installable asset out of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRule {
    /// Archive named `<product>*<ext>`, else any `*<ext>`. Case-insensitive.
    Archive {
        /// Lowercase product name prefix, e.g. `youtubeconverter`.
        product: String,
        /// Archive extension including the dot, e.g. `.zip`.
        extension: String,
    },
    /// Asset with exactly this file name.
    Exact(String),
}

impl AssetRule {
    /// Rule for the application's own `.zip` release archive.
    pub fn app_archive() -> Self {
        Self::Archive {
            product: "youtubeconverter".to_owned(),
            extension: ".zip".to_owned(),
        }
    }
}

/// A downloadable release asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Asset file name.
    pub name: String,
    /// Direct download URL.
    pub url: String,
    /// Size in bytes, when the API reports it.
    pub size: Option<u64>,
}

/// The single release a channel resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Git tag of the release.
    pub tag: String,
    /// Version string shown to the user (release name for nightlies).
    pub version: String,
    /// Whether the host flags the release as a prerelease.
    pub prerelease: bool,
    /// Installable asset, if one matched the [`AssetRule`].
    pub asset: Option<AssetRef>,
    /// Release notes (markdown).
    pub changelog: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReleaseWire {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<AssetWire>,
    #[serde(default)]
    body: Option<String>,
}

impl ReleaseWire {
    fn tag(&self) -> &str {
        self.tag_name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AssetWire {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TagWire {
    name: String,
}

/// Resolves channels against one GitHub repository.
pub struct ReleaseResolver {
    http: Arc<dyn HttpClient>,
    api_base: String,
    repo: String,
    rule: AssetRule,
}

impl std::fmt::Debug for ReleaseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseResolver")
            .field("api_base", &self.api_base)
            .field("repo", &self.repo)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

impl ReleaseResolver {
    /// Create a resolver for `repo` (`owner/name`) on the given API root.
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_base: impl Into<String>,
        repo: impl Into<String>,
        rule: AssetRule,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            repo: repo.into(),
            rule,
        }
    }

    /// Repository coordinates (`owner/name`).
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Shared HTTP client, reused by installers for the asset download.
    pub fn http(&self) -> Arc<dyn HttpClient> {
        Arc::clone(&self.http)
    }

    /// Resolve `channel` to a release.
    ///
    /// Every failed request is passed to `report` as a human-readable line.
    /// Returns `None` when nothing could be resolved.
    pub fn resolve(
        &self,
        channel: Channel,
        report: &mut dyn FnMut(String),
    ) -> Option<ReleaseDescriptor> {
        let wire = match channel {
            Channel::Nightly => self.resolve_nightly(report),
            Channel::Stable | Channel::Prerelease => self.resolve_listed(channel, report),
        }?;
        let descriptor = self.describe(wire, channel);
        if descriptor.is_none() {
            report(format!("Release for {} has no tag or name", self.repo));
        }
        descriptor
    }

    fn resolve_nightly(&self, report: &mut dyn FnMut(String)) -> Option<ReleaseWire> {
        // Direct lookup is a single request; listing tags is the fallback.
        if let Some(rel) = self.fetch::<ReleaseWire>(&self.release_by_tag_url(NIGHTLY_TAG), report)
        {
            return Some(rel);
        }
        let tags: Vec<TagWire> = self.fetch(&self.tags_url(), report).unwrap_or_default();
        let tag = tags
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(NIGHTLY_TAG))?;
        Some(self.release_for_tag(&tag.name, report))
    }

    fn resolve_listed(
        &self,
        channel: Channel,
        report: &mut dyn FnMut(String),
    ) -> Option<ReleaseWire> {
        let releases: Vec<ReleaseWire> =
            self.fetch(&self.releases_url(), report).unwrap_or_default();

        let picked = match channel {
            Channel::Stable => releases.iter().position(|r| !r.prerelease),
            _ => releases
                .iter()
                .position(|r| r.prerelease && !r.tag().eq_ignore_ascii_case(NIGHTLY_TAG))
                .or_else(|| releases.iter().position(|r| r.prerelease)),
        };
        if let Some(idx) = picked {
            return releases.into_iter().nth(idx);
        }

        let tags: Vec<TagWire> = self.fetch(&self.tags_url(), report).unwrap_or_default();
        let first = tags.first()?;
        let chosen = match channel {
            Channel::Stable => tags.iter().find(|t| looks_like_version(&t.name)),
            _ => tags
                .iter()
                .find(|t| !t.name.eq_ignore_ascii_case(NIGHTLY_TAG)),
        }
        .unwrap_or(first);
        Some(self.release_for_tag(&chosen.name, report))
    }

    /// Fetch the full release for `tag`, or a bare tag-only release.
    fn release_for_tag(&self, tag: &str, report: &mut dyn FnMut(String)) -> ReleaseWire {
        self.fetch(&self.release_by_tag_url(tag), report)
            .unwrap_or_else(|| ReleaseWire {
                tag_name: Some(tag.to_owned()),
                name: None,
                prerelease: false,
                assets: Vec::new(),
                body: None,
            })
    }

    fn describe(&self, wire: ReleaseWire, channel: Channel) -> Option<ReleaseDescriptor> {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let tag = non_empty(&wire.tag_name);
        let name = non_empty(&wire.name);
        let version = match channel {
            Channel::Nightly => name.clone().or_else(|| tag.clone()),
            _ => tag.clone().or_else(|| name.clone()),
        }?;
        let asset = select_asset(&wire.assets, &self.rule);
        Some(ReleaseDescriptor {
            tag: tag.unwrap_or_else(|| version.clone()),
            version,
            prerelease: wire.prerelease,
            asset,
            changelog: wire.body.filter(|b| !b.trim().is_empty()),
        })
    }

    fn fetch<T: DeserializeOwned>(&self, url: &str, report: &mut dyn FnMut(String)) -> Option<T> {
        let body = match self.http.get_json(url) {
            Ok(body) => body,
            Err(e) => {
                let msg = match e {
                    HttpError::RateLimited { .. } | HttpError::NotFound { .. } => e.to_string(),
                    _ => format!("GitHub API error: {e}"),
                };
                tracing::warn!("{msg}");
                report(msg);
                return None;
            }
        };
        match serde_json::from_str(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                let msg = format!("GitHub API error: unexpected response from {url}: {e}");
                tracing::warn!("{msg}");
                report(msg);
                None
            }
        }
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_base, self.repo)
    }

    fn tags_url(&self) -> String {
        format!("{}/repos/{}/tags?per_page=100", self.api_base, self.repo)
    }

    fn release_by_tag_url(&self, tag: &str) -> String {
        format!("{}/repos/{}/releases/tags/{tag}", self.api_base, self.repo)
    }
}

fn select_asset(assets: &[AssetWire], rule: &AssetRule) -> Option<AssetRef> {
    let found = match rule {
        AssetRule::Archive { product, extension } => {
            let ext = extension.to_lowercase();
            let prefix = product.to_lowercase();
            assets
                .iter()
                .find(|a| {
                    let n = a.name.to_lowercase();
                    n.starts_with(&prefix) && n.ends_with(&ext)
                })
                .or_else(|| assets.iter().find(|a| a.name.to_lowercase().ends_with(&ext)))
        }
        AssetRule::Exact(name) => assets.iter().find(|a| a.name == *name),
    }?;
    Some(AssetRef {
        name: found.name.clone(),
        url: found.browser_download_url.clone(),
        size: found.size,
    })
}

/// Normalize a version for comparison.
///
/// Strips one leading `v`/`V` when a digit follows, then lowercases, so
/// `V1.2.0` and `1.2.0` compare equal.
pub fn normalize_version(raw: &str) -> String {
    let s = raw.trim();
    let mut chars = s.chars();
    let stripped = match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(d)) if d.is_ascii_digit() => &s[1..],
        _ => s,
    };
    stripped.trim().to_lowercase()
}

/// Returns `true` when both versions are known and equal after normalization.
pub fn versions_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_version(a), normalize_version(b));
    !a.is_empty() && a == b
}

/// Tag names like `v1.2`, `V3`, or `2024.10.01`.
fn looks_like_version(tag: &str) -> bool {
    normalize_version(tag)
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::update::http::fake::FakeHttp;
    use serde_json::json;

    const API: &str = "https://api.test";
    const REPO: &str = "owner/app";

    fn releases_url() -> String {
        format!("{API}/repos/{REPO}/releases")
    }

    fn tags_url() -> String {
        format!("{API}/repos/{REPO}/tags?per_page=100")
    }

    fn tag_url(tag: &str) -> String {
        format!("{API}/repos/{REPO}/releases/tags/{tag}")
    }

    fn release(tag: &str, name: &str, prerelease: bool) -> serde_json::Value {
        json!({
            "tag_name": tag,
            "name": name,
            "prerelease": prerelease,
            "body": format!("notes for {tag}"),
            "assets": [{
                "name": format!("YoutubeConverter-{tag}.zip"),
                "browser_download_url": format!("https://dl.test/{tag}.zip"),
                "size": 1024
            }]
        })
    }

    fn mixed_list() -> serde_json::Value {
        json!([
            release("nightly", "nightly-2026.10.17", true),
            release("v1.5.0-rc1", "1.5.0 RC1", true),
            release("v1.4.2", "1.4.2", false),
        ])
    }

    fn resolver(http: FakeHttp) -> ReleaseResolver {
        ReleaseResolver::new(Arc::new(http), API, REPO, AssetRule::app_archive())
    }

    fn quiet() -> impl FnMut(String) {
        |_| {}
    }

    #[test]
    fn stable_picks_first_non_prerelease() {
        let r = resolver(FakeHttp::new().ok(&releases_url(), mixed_list().to_string()));
        let d = r.resolve(Channel::Stable, &mut quiet()).unwrap();
        assert_eq!(d.tag, "v1.4.2");
        assert!(!d.prerelease);
        assert_eq!(d.changelog.as_deref(), Some("notes for v1.4.2"));
    }

    #[test]
    fn prerelease_skips_nightly() {
        let r = resolver(FakeHttp::new().ok(&releases_url(), mixed_list().to_string()));
        let d = r.resolve(Channel::Prerelease, &mut quiet()).unwrap();
        assert_eq!(d.tag, "v1.5.0-rc1");
    }

    #[test]
    fn prerelease_falls_back_to_nightly_when_only_prerelease() {
        let list = json!([release("nightly", "n", true), release("v1.0.0", "1.0.0", false)]);
        let r = resolver(FakeHttp::new().ok(&releases_url(), list.to_string()));
        let d = r.resolve(Channel::Prerelease, &mut quiet()).unwrap();
        assert_eq!(d.tag, "nightly");
    }

    #[test]
    fn nightly_uses_direct_lookup() {
        let http = Arc::new(
            FakeHttp::new()
                .ok(&releases_url(), mixed_list().to_string())
                .ok(
                    &tag_url("nightly"),
                    release("nightly", "nightly-2026.10.17", true).to_string(),
                ),
        );
        let r = ReleaseResolver::new(http.clone(), API, REPO, AssetRule::app_archive());
        let d = r.resolve(Channel::Nightly, &mut quiet()).unwrap();
        assert_eq!(d.tag, "nightly");
        assert_eq!(d.version, "nightly-2026.10.17");
        assert_eq!(http.hits(), vec![tag_url("nightly")]);
    }

    #[test]
    fn nightly_falls_back_to_case_insensitive_tag() {
        let http = FakeHttp::new()
            .ok(&tags_url(), json!([{"name": "v1.0.0"}, {"name": "Nightly"}]).to_string())
            .ok(&tag_url("Nightly"), release("Nightly", "", true).to_string());
        let d = resolver(http).resolve(Channel::Nightly, &mut quiet()).unwrap();
        assert_eq!(d.tag, "Nightly");
        assert_eq!(d.version, "Nightly");
    }

    #[test]
    fn nightly_missing_everywhere_is_none() {
        let http = FakeHttp::new().ok(&tags_url(), json!([{"name": "v1.0.0"}]).to_string());
        assert!(resolver(http).resolve(Channel::Nightly, &mut quiet()).is_none());
    }

    #[test]
    fn stable_falls_back_to_version_like_tag() {
        let http = FakeHttp::new()
            .ok(&releases_url(), "[]")
            .ok(
                &tags_url(),
                json!([{"name": "nightly"}, {"name": "v1.3.0"}, {"name": "v1.2.0"}]).to_string(),
            );
        let d = resolver(http).resolve(Channel::Stable, &mut quiet()).unwrap();
        assert_eq!(d.tag, "v1.3.0");
        // Tag-only release: no release object, so no asset.
        assert!(d.asset.is_none());
    }

    #[test]
    fn stable_falls_back_to_first_tag() {
        let http = FakeHttp::new()
            .ok(&releases_url(), "[]")
            .ok(&tags_url(), json!([{"name": "latest"}, {"name": "beta"}]).to_string());
        let d = resolver(http).resolve(Channel::Stable, &mut quiet()).unwrap();
        assert_eq!(d.tag, "latest");
    }

    #[test]
    fn prerelease_tag_fallback_excludes_nightly() {
        let http = FakeHttp::new()
            .ok(&tags_url(), json!([{"name": "nightly"}, {"name": "v2.0.0-beta"}]).to_string())
            .ok(&tag_url("v2.0.0-beta"), release("v2.0.0-beta", "2.0.0 beta", true).to_string());
        let d = resolver(http).resolve(Channel::Prerelease, &mut quiet()).unwrap();
        assert_eq!(d.tag, "v2.0.0-beta");
        assert!(d.asset.is_some());
    }

    #[test]
    fn failures_are_reported_not_raised() {
        let http = FakeHttp::new()
            .fail(&releases_url(), HttpError::RateLimited { url: releases_url() })
            .fail(&tags_url(), HttpError::Transport("connection refused".to_owned()));
        let mut lines = Vec::new();
        let d = resolver(http).resolve(Channel::Stable, &mut |l| lines.push(l));
        assert!(d.is_none());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("rate limited (403)"));
        assert!(lines[1].starts_with("GitHub API error:"));
    }

    #[test]
    fn not_found_reported_distinctly() {
        let mut lines = Vec::new();
        let d = resolver(FakeHttp::new()).resolve(Channel::Stable, &mut |l| lines.push(l));
        assert!(d.is_none());
        assert!(lines.iter().all(|l| l.contains("Not found (404)")));
    }

    #[test]
    fn malformed_json_is_reported() {
        let http = FakeHttp::new().ok(&releases_url(), "{not json");
        let mut lines = Vec::new();
        let _ = resolver(http).resolve(Channel::Stable, &mut |l| lines.push(l));
        assert!(lines[0].contains("unexpected response"));
    }

    #[test]
    fn asset_prefers_product_name() {
        let list = json!([{
            "tag_name": "v1.4.2",
            "prerelease": false,
            "assets": [
                {"name": "sources.zip", "browser_download_url": "https://dl.test/sources.zip"},
                {"name": "YoutubeConverter-win64.zip", "browser_download_url": "https://dl.test/app.zip"},
                {"name": "checksums.txt", "browser_download_url": "https://dl.test/sums"}
            ]
        }]);
        let r = resolver(FakeHttp::new().ok(&releases_url(), list.to_string()));
        let asset = r.resolve(Channel::Stable, &mut quiet()).unwrap().asset.unwrap();
        assert_eq!(asset.name, "YoutubeConverter-win64.zip");
        assert_eq!(asset.url, "https://dl.test/app.zip");
    }

    #[test]
    fn asset_falls_back_to_any_archive() {
        let list = json!([{
            "tag_name": "v1.4.2",
            "assets": [
                {"name": "readme.md", "browser_download_url": "https://dl.test/readme"},
                {"name": "bundle.ZIP", "browser_download_url": "https://dl.test/bundle"}
            ]
        }]);
        let r = resolver(FakeHttp::new().ok(&releases_url(), list.to_string()));
        let asset = r.resolve(Channel::Stable, &mut quiet()).unwrap().asset.unwrap();
        assert_eq!(asset.name, "bundle.ZIP");
    }

    #[test]
    fn no_matching_asset_is_none_not_error() {
        let list = json!([{"tag_name": "v1.4.2", "assets": [
            {"name": "app.tar.gz", "browser_download_url": "https://dl.test/x"}
        ]}]);
        let r = resolver(FakeHttp::new().ok(&releases_url(), list.to_string()));
        let d = r.resolve(Channel::Stable, &mut quiet()).unwrap();
        assert!(d.asset.is_none());
    }

    #[test]
    fn exact_rule_matches_binary_name() {
        let list = json!([{"tag_name": "2026.10.01", "assets": [
            {"name": "yt-dlp.exe", "browser_download_url": "https://dl.test/exe"},
            {"name": "yt-dlp", "browser_download_url": "https://dl.test/unix"}
        ]}]);
        let r = ReleaseResolver::new(
            Arc::new(FakeHttp::new().ok(&releases_url(), list.to_string())),
            API,
            REPO,
            AssetRule::Exact("yt-dlp".to_owned()),
        );
        let d = r.resolve(Channel::Stable, &mut quiet()).unwrap();
        assert_eq!(d.asset.unwrap().url, "https://dl.test/unix");
    }

    #[test]
    fn resolving_twice_is_identical() {
        let r = resolver(FakeHttp::new().ok(&releases_url(), mixed_list().to_string()));
        let a = r.resolve(Channel::Stable, &mut quiet());
        let b = r.resolve(Channel::Stable, &mut quiet());
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_version_strips_prefix() {
        assert_eq!(normalize_version("v1.4.2"), "1.4.2");
        assert_eq!(normalize_version("V1.4.2"), "1.4.2");
        assert_eq!(normalize_version(" 1.4.2 "), "1.4.2");
        assert_eq!(normalize_version("vNext"), "vnext");
        assert_eq!(normalize_version("v"), "v");
        assert_eq!(normalize_version(""), "");
    }

    #[test]
    fn versions_match_semantics() {
        assert!(versions_match("v1.4.2", "1.4.2"));
        assert!(versions_match("V1.4.2", "v1.4.2"));
        assert!(!versions_match("1.4.2", "1.4.3"));
        assert!(!versions_match("", ""));
    }

    #[test]
    fn channel_accepts_release_alias() {
        let c: Channel = serde_json::from_str(r#""release""#).unwrap();
        assert_eq!(c, Channel::Stable);
        let c: Channel = serde_json::from_str(r#""nightly""#).unwrap();
        assert_eq!(c, Channel::Nightly);
    }
}
