use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::LAST_MODIFIED;
use tracing::{debug, warn};

use crate::error::{Result, SchemaVetError};

/// Total fetch attempts before a download is declared failed. Covers both
/// network-level failures and payload-validation failures.
pub const DOWNLOAD_ATTEMPTS: u32 = 3;

const CACHE_SUBDIR: &str = "schemavet";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_FILENAME: &str = "schema.json";

/// Caller-owned download configuration. `cache_dir = None` means the
/// platform cache root could not be resolved; downloads then bypass disk.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub cache_dir: Option<PathBuf>,
    pub disable_cache: bool,
    pub timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            disable_cache: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CacheSettings {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            cache_dir: None,
            disable_cache: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resolve the per-user cache directory for downloaded schemas.
#[must_use]
pub fn default_cache_dir() -> Option<PathBuf> {
    base_cache_dir().map(|base| base.join(CACHE_SUBDIR))
}

#[cfg(target_os = "windows")]
fn base_cache_dir() -> Option<PathBuf> {
    std::env::var_os("LOCALAPPDATA")
        .or_else(|| std::env::var_os("APPDATA"))
        .map(PathBuf::from)
}

#[cfg(target_os = "macos")]
fn base_cache_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Library").join("Caches"))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn base_cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// How one fetch attempt went wrong. Retryable failures are values, not
/// errors; only conditions like a failing disk escalate immediately.
enum FetchFailure {
    Retry(String),
    Fatal(SchemaVetError),
}

pub struct CacheDownloader {
    settings: CacheSettings,
    http: Client,
}

impl std::fmt::Debug for CacheDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDownloader")
            .field("cache_dir", &self.settings.cache_dir)
            .field("disable_cache", &self.settings.disable_cache)
            .finish_non_exhaustive()
    }
}

impl CacheDownloader {
    pub fn new(settings: CacheSettings) -> Result<Self> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, http })
    }

    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Fetch `url`, maintaining the per-URL cache file unless caching is off.
    ///
    /// `filename` overrides the cache file name, which otherwise is the last
    /// `/`-segment of the URL. `validate` vets payload bytes; rejected
    /// payloads are treated like network failures and retried. Bytes that
    /// fail validation are never committed to the cache, so exhausting the
    /// attempt budget leaves no cache file behind.
    pub fn fetch(
        &self,
        url: &str,
        filename: Option<&str>,
        validate: &dyn Fn(&[u8]) -> bool,
    ) -> Result<Vec<u8>> {
        let cache_path = self.cache_path(url, filename);
        let mut last_failure = String::from("no attempt was made");

        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            match self.attempt(url, cache_path.as_deref(), validate) {
                Ok(bytes) => return Ok(bytes),
                Err(FetchFailure::Fatal(err)) => return Err(err),
                Err(FetchFailure::Retry(reason)) => {
                    warn!(%url, attempt, %reason, "schema fetch attempt failed");
                    last_failure = reason;
                }
            }
        }

        Err(SchemaVetError::FailedDownload {
            url: url.to_string(),
            attempts: DOWNLOAD_ATTEMPTS,
            reason: last_failure,
        })
    }

    fn cache_path(&self, url: &str, filename: Option<&str>) -> Option<PathBuf> {
        if self.settings.disable_cache {
            return None;
        }
        let dir = self.settings.cache_dir.as_ref()?;
        let name = filename
            .map(ToString::to_string)
            .unwrap_or_else(|| url_tail(url));
        Some(dir.join(name))
    }

    fn attempt(
        &self,
        url: &str,
        cache_path: Option<&Path>,
        validate: &dyn Fn(&[u8]) -> bool,
    ) -> std::result::Result<Vec<u8>, FetchFailure> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| FetchFailure::Retry(format!("request failed: {err}")))?;
        let response = response
            .error_for_status()
            .map_err(|err| FetchFailure::Retry(format!("bad response status: {err}")))?;

        let Some(path) = cache_path else {
            let body = read_body(response)?;
            return Ok(body);
        };

        // The body is not read while the cached copy is still fresh; a
        // cache hit costs headers only.
        if cache_is_fresh(path, &response) {
            match fs::read(path) {
                Ok(bytes) if validate(&bytes) => {
                    debug!(%url, cache_file = %path.display(), "using cached schema");
                    return Ok(bytes);
                }
                Ok(_) => {
                    debug!(%url, "cached copy failed validation, downloading a fresh one");
                }
                Err(err) => {
                    debug!(%url, %err, "cached copy unreadable, downloading a fresh one");
                }
            }
        }

        let body = read_body(response)?;
        write_atomic(path, &body).map_err(FetchFailure::Fatal)?;
        debug!(%url, cache_file = %path.display(), "schema downloaded");
        Ok(body)
    }
}

fn read_body(response: Response) -> std::result::Result<Vec<u8>, FetchFailure> {
    let bytes = response
        .bytes()
        .map_err(|err| FetchFailure::Retry(format!("failed to read response body: {err}")))?;
    Ok(bytes.to_vec())
}

/// The cached copy is fresh when its mtime is at or after the remote
/// `Last-Modified`. A missing or unparseable header counts as always
/// stale: freshness is decided purely client-side, no conditional request
/// is ever sent, so a body change without a header bump goes unnoticed.
fn cache_is_fresh(path: &Path, response: &Response) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    let Ok(local_mtime) = metadata.modified() else {
        return false;
    };
    let Some(remote_mtime) = remote_last_modified(response) else {
        return false;
    };
    DateTime::<Utc>::from(local_mtime) >= remote_mtime
}

fn remote_last_modified(response: &Response) -> Option<DateTime<Utc>> {
    let header = response.headers().get(LAST_MODIFIED)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(header)
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

pub(crate) fn url_tail(url: &str) -> String {
    let trimmed = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if tail.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        tail.to_string()
    }
}

/// Commit `bytes` to `path` so that concurrent readers see either the old
/// complete file or the new complete file, never a torn write. The payload
/// lands in a hidden sibling tempfile first and is renamed into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        SchemaVetError::Internal(format!("cache target has no parent: {}", path.display()))
    })?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            SchemaVetError::Internal(format!("invalid cache filename: {}", path.display()))
        })?;
    let tmp_name = format!(".{file_name}.schemavet.tmp.{}", uuid::Uuid::new_v4().simple());
    let tmp_path = parent.join(tmp_name);

    {
        let mut tmp = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(SchemaVetError::from(err));
    }

    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn url_tail_takes_the_last_segment() {
        assert_eq!(url_tail("https://example.com/schemas/main.json"), "main.json");
        assert_eq!(url_tail("https://example.com/main.json?v=2"), "main.json");
        assert_eq!(url_tail("https://example.com/"), "example.com");
    }

    #[test]
    fn write_atomic_creates_and_overwrites() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("cached.json");

        write_atomic(&target, b"{\"v\": 1}").expect("first write");
        assert_eq!(fs::read(&target).expect("read"), b"{\"v\": 1}");

        write_atomic(&target, b"{\"v\": 2}").expect("second write");
        assert_eq!(fs::read(&target).expect("read"), b"{\"v\": 2}");
    }

    #[test]
    fn write_atomic_leaves_no_tempfiles_behind() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("cached.json");
        write_atomic(&target, b"payload").expect("write");

        let names: Vec<String> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cached.json".to_string()]);
    }

    #[test]
    fn disabled_settings_have_no_cache_path() {
        let downloader = CacheDownloader::new(CacheSettings::disabled()).expect("downloader");
        assert_eq!(
            downloader.cache_path("https://example.com/main.json", None),
            None
        );
    }

    #[test]
    fn cache_path_prefers_the_override() {
        let settings = CacheSettings {
            cache_dir: Some(PathBuf::from("/var/cache/schemavet")),
            disable_cache: false,
            timeout: Duration::from_secs(5),
        };
        let downloader = CacheDownloader::new(settings).expect("downloader");
        assert_eq!(
            downloader.cache_path("https://example.com/main.json", Some("pinned.json")),
            Some(PathBuf::from("/var/cache/schemavet/pinned.json"))
        );
        assert_eq!(
            downloader.cache_path("https://example.com/main.json", None),
            Some(PathBuf::from("/var/cache/schemavet/main.json"))
        );
    }
}
