//! Download, verify and install release artifacts.
//!
//! Two artifact kinds:
//!
//! - **Binary** ([`BinaryInstaller`]): a single executable at a fixed path,
//!   replaced by renaming a fully written temp file over it.
//! - **Application** ([`AppStager`]): a release archive extracted into a
//!   staging directory next to the live install, plus a `.pending` marker.
//!   The running process cannot overwrite its own files, so
//!   [`apply_staged_update`] runs later from a helper process.
//!
//! Temp downloads are always written from scratch; a leftover from a canceled
//! run is never resumed.

use crate::error::{Result, UpdateError};
use crate::paths::{PENDING_MARKER, STAGING_DOWNLOAD, UpdatePaths};
use crate::update::http::HttpClient;
use crate::update::release::AssetRef;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read size for downloads; cancellation is checked between chunks.
const CHUNK_SIZE: usize = 256 * 1024;

/// Shared cancellation flag, checked at every chunk and archive entry.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an un-canceled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Canceled)` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(UpdateError::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Progress callback: `(bytes_so_far, total_if_known)`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Stream `url` into `dest`, truncating any previous content.
///
/// On failure or cancellation the partial file is removed.
///
/// # Errors
///
/// Returns an error on HTTP failure, a short or empty body, cancellation, or
/// a filesystem write failure.
pub fn download_to(
    http: &dyn HttpClient,
    url: &str,
    dest: &Path,
    cancel: &CancelToken,
    progress: ProgressFn<'_>,
) -> Result<u64> {
    let result = stream_into(http, url, dest, cancel, progress);
    if result.is_err() {
        remove_if_exists(dest);
    }
    result
}

fn stream_into(
    http: &dyn HttpClient,
    url: &str,
    dest: &Path,
    cancel: &CancelToken,
    progress: ProgressFn<'_>,
) -> Result<u64> {
    cancel.check()?;
    let mut download = http
        .get_stream(url)
        .map_err(|e| UpdateError::Download(e.to_string()))?;
    let total = download.content_length;

    let mut file = std::fs::File::create(dest).map_err(|e| {
        UpdateError::Download(format!("cannot create temp file {}: {e}", dest.display()))
    })?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        cancel.check()?;
        let n = download
            .reader
            .read(&mut buf)
            .map_err(|e| UpdateError::Download(format!("read interrupted: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| UpdateError::Download(format!("write failed: {e}")))?;
        written += n as u64;
        progress(written, total);
    }
    file.sync_all()?;

    if written == 0 {
        return Err(UpdateError::Download(format!("empty response from {url}")));
    }
    if let Some(expected) = total
        && expected != written
    {
        return Err(UpdateError::Download(format!(
            "truncated transfer: got {written} of {expected} bytes"
        )));
    }
    tracing::debug!("downloaded {written} bytes to {}", dest.display());
    Ok(written)
}

/// Installs a single executable in place.
pub struct BinaryInstaller {
    http: Arc<dyn HttpClient>,
    target: PathBuf,
    temp: PathBuf,
}

impl BinaryInstaller {
    /// Installer for `paths.ytdlp_binary`, using its `.tmp` sibling.
    pub fn new(http: Arc<dyn HttpClient>, paths: &UpdatePaths) -> Self {
        Self {
            http,
            target: paths.ytdlp_binary.clone(),
            temp: paths.ytdlp_temp(),
        }
    }

    /// Final binary location.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Download the asset to the temp file next to the target.
    ///
    /// # Errors
    ///
    /// See [`download_to`].
    pub fn download(
        &self,
        asset: &AssetRef,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> Result<u64> {
        if let Some(parent) = self.target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                UpdateError::Install(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        download_to(self.http.as_ref(), &asset.url, &self.temp, cancel, progress)
    }

    /// Check the downloaded file is non-empty and matches the advertised size.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Download`] and removes the temp file on mismatch.
    pub fn verify(&self, asset: &AssetRef) -> Result<()> {
        let len = std::fs::metadata(&self.temp)
            .map_err(|e| UpdateError::Download(format!("downloaded file missing: {e}")))?
            .len();
        let mismatch = len == 0 || asset.size.is_some_and(|s| s > 0 && s != len);
        if mismatch {
            remove_if_exists(&self.temp);
            return Err(UpdateError::Download(format!(
                "{} is {len} bytes, expected {}",
                asset.name,
                asset.size.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Move the verified temp file over the target and mark it executable.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Install`] if the rename fails; the temp file is
    /// removed in that case.
    pub fn replace(&self) -> Result<()> {
        // POSIX rename overwrites atomically; Windows refuses an existing target.
        if cfg!(target_os = "windows") && self.target.exists() {
            let _ = std::fs::remove_file(&self.target);
        }
        if let Err(e) = std::fs::rename(&self.temp, &self.target) {
            remove_if_exists(&self.temp);
            return Err(UpdateError::Install(format!(
                "cannot move new binary into {}: {e}",
                self.target.display()
            )));
        }
        if let Err(e) = set_executable(&self.target) {
            tracing::warn!("{e}");
        }
        tracing::info!("binary updated at {}", self.target.display());
        Ok(())
    }
}

/// Stages an application archive for apply-on-restart.
pub struct AppStager {
    http: Arc<dyn HttpClient>,
    paths: UpdatePaths,
}

impl AppStager {
    /// Stager writing into `paths.staging_dir`.
    pub fn new(http: Arc<dyn HttpClient>, paths: UpdatePaths) -> Self {
        Self { http, paths }
    }

    /// Download the release archive into the staging directory.
    ///
    /// # Errors
    ///
    /// See [`download_to`].
    pub fn download(
        &self,
        asset: &AssetRef,
        cancel: &CancelToken,
        progress: ProgressFn<'_>,
    ) -> Result<u64> {
        std::fs::create_dir_all(&self.paths.staging_dir).map_err(|e| {
            UpdateError::Install(format!(
                "cannot create staging dir {}: {e}",
                self.paths.staging_dir.display()
            ))
        })?;
        download_to(
            self.http.as_ref(),
            &asset.url,
            &self.paths.staging_download(),
            cancel,
            progress,
        )
    }

    /// Replace the staging contents with the downloaded archive's tree and
    /// write the pending marker.
    ///
    /// The archive is deleted whatever the outcome. Anything already extracted
    /// stays in place on failure and is cleared by the next attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is unreadable or empty, extraction
    /// fails, or the run is canceled.
    pub fn stage(&self, version: &str, cancel: &CancelToken) -> Result<usize> {
        let archive = self.paths.staging_download();
        let result = self.stage_inner(&archive, version, cancel);
        remove_if_exists(&archive);
        result
    }

    fn stage_inner(&self, archive: &Path, version: &str, cancel: &CancelToken) -> Result<usize> {
        clear_dir_except(&self.paths.staging_dir, archive)?;
        let count = extract_zip_flat(archive, &self.paths.staging_dir, cancel)?;
        std::fs::write(self.paths.pending_marker(), version).map_err(|e| {
            UpdateError::Install(format!("cannot write pending marker: {e}"))
        })?;
        tracing::info!(
            "staged {count} files for {version} in {}",
            self.paths.staging_dir.display()
        );
        Ok(count)
    }
}

/// Remove everything in `dir` except the file at `keep`.
fn clear_dir_except(dir: &Path, keep: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path == keep {
            continue;
        }
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Extract `zip_path` into `dest`, dropping each entry's first path component.
///
/// Release archives wrap everything in one top-level folder; flattening makes
/// the staged tree mirror the installation root. Entries that would escape
/// `dest` are skipped.
///
/// # Errors
///
/// Returns [`UpdateError::Archive`] if the archive is unreadable or holds no
/// files, [`UpdateError::Canceled`] on cancellation.
pub fn extract_zip_flat(zip_path: &Path, dest: &Path, cancel: &CancelToken) -> Result<usize> {
    let file = std::fs::File::open(zip_path)
        .map_err(|e| UpdateError::Archive(format!("cannot open {}: {e}", zip_path.display())))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| UpdateError::Archive(e.to_string()))?;

    let mut extracted = 0usize;
    for index in 0..archive.len() {
        cancel.check()?;
        let mut entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::Archive(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            tracing::warn!("skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let Some(relative) = strip_top_level(&enclosed) else {
            continue;
        };

        let out_path = dest.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|e| {
            UpdateError::Install(format!("cannot write {}: {e}", out_path.display()))
        })?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|e| UpdateError::Archive(format!("{}: {e}", entry.name())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let mode = (mode & 0o7777) | 0o600;
                let _ =
                    std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
        extracted += 1;
    }

    if extracted == 0 {
        return Err(UpdateError::Archive(format!(
            "{} contains no files",
            zip_path.display()
        )));
    }
    Ok(extracted)
}

/// `top/a/b` → `a/b`; a bare `file` stays as is.
fn strip_top_level(path: &Path) -> Option<PathBuf> {
    let parts: Vec<Component<'_>> = path.components().collect();
    let kept: PathBuf = if parts.len() > 1 {
        parts[1..].iter().collect()
    } else {
        parts.iter().collect()
    };
    if kept.as_os_str().is_empty() {
        None
    } else {
        Some(kept)
    }
}

/// Version recorded in the staging marker, if an update is pending.
pub fn pending_version(paths: &UpdatePaths) -> Option<String> {
    std::fs::read_to_string(paths.pending_marker())
        .ok()
        .map(|s| s.trim().to_owned())
}

/// Copy the staged tree over the installation root and remove staging.
///
/// Runs from the relaunch helper once the application has exited. Returns the
/// applied version, or `None` when nothing was pending.
///
/// # Errors
///
/// Returns [`UpdateError::Install`] if a file cannot be copied.
pub fn apply_staged_update(paths: &UpdatePaths) -> Result<Option<String>> {
    if !paths.pending_marker().is_file() {
        return Ok(None);
    }
    let version = pending_version(paths).unwrap_or_default();
    let copied = copy_tree(&paths.staging_dir, &paths.install_root, &paths.staging_dir)?;
    std::fs::remove_dir_all(&paths.staging_dir)?;
    tracing::info!("applied staged update {version} ({copied} files)");
    Ok(Some(version))
}

fn copy_tree(from: &Path, to: &Path, staging_root: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let name = entry.file_name();
        if from == staging_root && (name == PENDING_MARKER || name == STAGING_DOWNLOAD) {
            continue;
        }
        let dst = to.join(&name);
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&dst)?;
            copied += copy_tree(&src, &dst, staging_root)?;
        } else {
            std::fs::copy(&src, &dst).map_err(|e| {
                UpdateError::Install(format!("cannot copy {}: {e}", dst.display()))
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Set executable permission on Unix platforms.
fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            UpdateError::Install(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn remove_if_exists(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        tracing::warn!("cannot remove {}: {e}", path.display());
    }
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::update::http::fake::FakeHttp;

    fn asset(url: &str, size: Option<u64>) -> AssetRef {
        AssetRef {
            name: "asset".to_owned(),
            url: url.to_owned(),
            size,
        }
    }

    fn no_progress() -> impl FnMut(u64, Option<u64>) {
        |_, _| {}
    }

    #[test]
    fn download_overwrites_stale_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.tmp");
        std::fs::write(&dest, b"stale partial bytes from a killed run").unwrap();
        let http = FakeHttp::new().ok("https://dl.test/x", b"fresh".to_vec());

        let n = download_to(&http, "https://dl.test/x", &dest, &CancelToken::new(), &mut no_progress())
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[test]
    fn download_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.tmp");
        let http = FakeHttp::new().ok("https://dl.test/x", vec![7u8; 10]);
        let mut seen = Vec::new();
        download_to(&http, "https://dl.test/x", &dest, &CancelToken::new(), &mut |d, t| {
            seen.push((d, t))
        })
        .unwrap();
        assert_eq!(seen.last(), Some(&(10, Some(10))));
    }

    #[test]
    fn canceled_download_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.tmp");
        std::fs::write(&dest, b"old").unwrap();
        let http = FakeHttp::new().ok("https://dl.test/x", b"data".to_vec());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = download_to(&http, "https://dl.test/x", &dest, &cancel, &mut no_progress())
            .unwrap_err();
        assert!(matches!(err, UpdateError::Canceled));
        assert!(!dest.exists());
    }

    #[test]
    fn http_failure_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.tmp");
        let err = download_to(
            &FakeHttp::new(),
            "https://dl.test/missing",
            &dest,
            &CancelToken::new(),
            &mut no_progress(),
        )
        .unwrap_err();
        assert!(matches!(err, UpdateError::Download(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn empty_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.tmp");
        let http = FakeHttp::new().ok("https://dl.test/x", Vec::new());
        let err = download_to(&http, "https://dl.test/x", &dest, &CancelToken::new(), &mut no_progress())
            .unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }

    #[test]
    fn binary_install_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        std::fs::create_dir_all(paths.ytdlp_binary.parent().unwrap()).unwrap();
        std::fs::write(&paths.ytdlp_binary, b"old-binary").unwrap();

        let http = Arc::new(FakeHttp::new().ok("https://dl.test/yt-dlp", b"new-binary".to_vec()));
        let installer = BinaryInstaller::new(http, &paths);
        let a = asset("https://dl.test/yt-dlp", Some(10));
        installer.download(&a, &CancelToken::new(), &mut no_progress()).unwrap();
        installer.verify(&a).unwrap();
        installer.replace().unwrap();

        assert_eq!(std::fs::read(&paths.ytdlp_binary).unwrap(), b"new-binary");
        assert!(!paths.ytdlp_temp().exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&paths.ytdlp_binary).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn binary_install_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        let http = Arc::new(FakeHttp::new().ok("https://dl.test/yt-dlp", b"bin".to_vec()));
        let installer = BinaryInstaller::new(http, &paths);
        let a = asset("https://dl.test/yt-dlp", None);
        installer.download(&a, &CancelToken::new(), &mut no_progress()).unwrap();
        installer.verify(&a).unwrap();
        installer.replace().unwrap();
        assert!(installer.target().is_file());
    }

    #[test]
    fn verify_rejects_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        let http = Arc::new(FakeHttp::new().ok("https://dl.test/yt-dlp", b"bin".to_vec()));
        let installer = BinaryInstaller::new(http, &paths);
        let a = asset("https://dl.test/yt-dlp", Some(999));
        installer.download(&a, &CancelToken::new(), &mut no_progress()).unwrap();
        assert!(installer.verify(&a).is_err());
        assert!(!paths.ytdlp_temp().exists());
    }

    #[test]
    fn stage_flattens_top_level_and_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        let zip = test_zip::build(&[
            ("YoutubeConverter/", b""),
            ("YoutubeConverter/YoutubeConverter.exe", b"exe"),
            ("YoutubeConverter/lib/core.dll", b"dll"),
            ("README.txt", b"top-level file"),
        ]);
        let http = Arc::new(FakeHttp::new().ok("https://dl.test/app.zip", zip));
        let stager = AppStager::new(http, paths.clone());
        let a = asset("https://dl.test/app.zip", None);

        stager.download(&a, &CancelToken::new(), &mut no_progress()).unwrap();
        let count = stager.stage("1.4.2", &CancelToken::new()).unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            std::fs::read(paths.staging_dir.join("YoutubeConverter.exe")).unwrap(),
            b"exe"
        );
        assert!(paths.staging_dir.join("lib").join("core.dll").is_file());
        assert!(paths.staging_dir.join("README.txt").is_file());
        assert_eq!(pending_version(&paths).as_deref(), Some("1.4.2"));
        assert!(!paths.staging_download().exists());
    }

    #[test]
    fn stage_clears_previous_staging() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        std::fs::create_dir_all(paths.staging_dir.join("stale")).unwrap();
        std::fs::write(paths.staging_dir.join("stale").join("old.dll"), b"x").unwrap();
        std::fs::write(paths.staging_dir.join("leftover.txt"), b"x").unwrap();

        let zip = test_zip::build(&[("App/new.dll", b"new")]);
        let http = Arc::new(FakeHttp::new().ok("https://dl.test/app.zip", zip));
        let stager = AppStager::new(http, paths.clone());
        stager
            .download(&asset("https://dl.test/app.zip", None), &CancelToken::new(), &mut no_progress())
            .unwrap();
        stager.stage("2.0.0", &CancelToken::new()).unwrap();

        assert!(!paths.staging_dir.join("stale").exists());
        assert!(!paths.staging_dir.join("leftover.txt").exists());
        assert!(paths.staging_dir.join("new.dll").is_file());
    }

    #[test]
    fn corrupt_archive_fails_and_removes_download() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        let http = Arc::new(FakeHttp::new().ok("https://dl.test/app.zip", b"not a zip".to_vec()));
        let stager = AppStager::new(http, paths.clone());
        stager
            .download(&asset("https://dl.test/app.zip", None), &CancelToken::new(), &mut no_progress())
            .unwrap();

        let err = stager.stage("2.0.0", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, UpdateError::Archive(_)));
        assert!(!paths.staging_download().exists());
        assert!(paths.staging_dir.is_dir());
        assert!(pending_version(&paths).is_none());
    }

    #[test]
    fn archive_with_only_directories_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("dirs.zip");
        std::fs::write(&zip_path, test_zip::build(&[("App/", b""), ("App/sub/", b"")])).unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let err = extract_zip_flat(&zip_path, &out, &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("contains no files"));
    }

    #[test]
    fn extraction_honors_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("a.zip");
        std::fs::write(&zip_path, test_zip::build(&[("App/a", b"a")])).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = extract_zip_flat(&zip_path, dir.path(), &cancel).unwrap_err();
        assert!(matches!(err, UpdateError::Canceled));
    }

    #[test]
    fn strip_top_level_cases() {
        assert_eq!(strip_top_level(Path::new("top/a/b")), Some(PathBuf::from("a/b")));
        assert_eq!(strip_top_level(Path::new("file")), Some(PathBuf::from("file")));
    }

    #[test]
    fn apply_staged_copies_and_cleans() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        std::fs::write(dir.path().join("app.exe"), b"old").unwrap();
        std::fs::create_dir_all(paths.staging_dir.join("lib")).unwrap();
        std::fs::write(paths.staging_dir.join("app.exe"), b"new").unwrap();
        std::fs::write(paths.staging_dir.join("lib").join("x.dll"), b"dll").unwrap();
        std::fs::write(paths.pending_marker(), "1.5.0\n").unwrap();

        let applied = apply_staged_update(&paths).unwrap();
        assert_eq!(applied.as_deref(), Some("1.5.0"));
        assert_eq!(std::fs::read(dir.path().join("app.exe")).unwrap(), b"new");
        assert!(dir.path().join("lib").join("x.dll").is_file());
        assert!(!dir.path().join(PENDING_MARKER).exists());
        assert!(!paths.staging_dir.exists());
    }

    #[test]
    fn apply_staged_without_marker_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::from_root(dir.path());
        std::fs::create_dir_all(&paths.staging_dir).unwrap();
        std::fs::write(paths.staging_dir.join("half.dll"), b"x").unwrap();
        assert_eq!(apply_staged_update(&paths).unwrap(), None);
        assert!(paths.staging_dir.join("half.dll").exists());
    }
}
