//! Build tool artifact cache.
//!
//! Defold's build tool ("bob") is a versioned jar published on the official
//! download archive, addressed by the content sha of the engine release it
//! belongs to. This module caches one jar per sha under the cache directory
//! and translates between shas and human version strings:
//!
//! - the stable and beta channels each publish a `info.json` descriptor with
//!   the channel's current `sha1` and `version`
//! - a community-maintained manifest lists `{version, sha1}` pairs for all
//!   released versions
//! - jars download from `archive/<sha>/bob/bob.jar`
//!
//! All calls are blocking; any unreachable endpoint is a fatal error except
//! for hash→version translation, where an unrecognized sha degrades to
//! `"unknown"` (pinning an unreleased build is legitimate).

use std::io::{Read, Write};
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::debug;

use crate::paths::CacheLayout;
use crate::{Error, Result};

/// Environment override for the download archive base URL.
pub const ARCHIVE_URL_ENV: &str = "DEFBUILD_ARCHIVE_URL";
/// Environment override for the version manifest URL.
pub const VERSIONS_URL_ENV: &str = "DEFBUILD_VERSIONS_URL";

const DEFAULT_ARCHIVE_URL: &str = "http://d.defold.com";
const DEFAULT_VERSIONS_URL: &str =
    "https://gist.githubusercontent.com/Jerakin/801f6a71121095c467eaae9689d41828/raw/";

/// Version string reported for a sha that no channel or manifest knows.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Channel descriptor published at `<archive>/{stable,beta}/info.json`.
///
/// The live documents carry more fields; only these two matter here.
#[derive(Debug, Deserialize)]
pub struct ChannelInfo {
    pub version: String,
    pub sha1: String,
}

/// One released version in the manifest.
#[derive(Debug, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    pub sha1: String,
}

/// The remote version manifest, fetched on demand and never persisted.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

impl VersionManifest {
    pub fn version_for(&self, sha: &str) -> Option<&str> {
        self.versions
            .iter()
            .find(|entry| entry.sha1 == sha)
            .map(|entry| entry.version.as_str())
    }

    pub fn sha_for(&self, version: &str) -> Option<&str> {
        self.versions
            .iter()
            .find(|entry| entry.version == version)
            .map(|entry| entry.sha1.as_str())
    }
}

/// Whether a string is plausibly a content sha (40 hex chars).
///
/// Raw shas end up embedded in cache filenames, so anything else is rejected
/// before it can touch the filesystem.
pub fn looks_like_sha(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Remote endpoint set, overridable through the environment so tests can
/// point the tool at a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    archive_base: String,
    versions_url: String,
}

impl Endpoints {
    pub fn new(archive_base: impl Into<String>, versions_url: impl Into<String>) -> Self {
        Self {
            archive_base: archive_base.into(),
            versions_url: versions_url.into(),
        }
    }

    pub fn from_env() -> Self {
        Self {
            archive_base: std::env::var(ARCHIVE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_ARCHIVE_URL.to_string()),
            versions_url: std::env::var(VERSIONS_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_VERSIONS_URL.to_string()),
        }
    }

    fn stable_info(&self) -> String {
        format!("{}/stable/info.json", self.archive_base)
    }

    fn beta_info(&self) -> String {
        format!("{}/beta/info.json", self.archive_base)
    }

    fn archive(&self, sha: &str) -> String {
        format!("{}/archive/{}/bob/bob.jar", self.archive_base, sha)
    }
}

/// Local, content-addressed cache of build tool jars.
pub struct ArtifactCache {
    layout: CacheLayout,
    endpoints: Endpoints,
}

impl ArtifactCache {
    pub fn new(layout: CacheLayout) -> Self {
        Self {
            layout,
            endpoints: Endpoints::from_env(),
        }
    }

    pub fn with_endpoints(layout: CacheLayout, endpoints: Endpoints) -> Self {
        Self { layout, endpoints }
    }

    /// Whether the jar for `sha` is already present locally.
    ///
    /// File existence at the derived path is the only source of truth; no
    /// separate index of cached entries exists.
    pub fn is_cached(&self, sha: &str) -> bool {
        self.layout.artifact_path(sha).exists()
    }

    /// Return the local path for `sha`, downloading it first when it is not
    /// cached yet (or when `force` demands a fresh copy).
    ///
    /// A cache hit performs no network access at all.
    pub fn resolve(&self, sha: &str, force: bool) -> Result<PathBuf> {
        let path = self.layout.artifact_path(sha);
        if !force && path.exists() {
            debug!("Cache hit for {}", sha);
            return Ok(path);
        }
        self.download(sha)
    }

    /// Probe the archive for `sha` and stream the jar into the cache.
    ///
    /// The body lands in a temporary file next to the target and is renamed
    /// into place only once fully written, so an interrupted download never
    /// leaves a truncated jar that a later cache-hit check would trust.
    pub fn download(&self, sha: &str) -> Result<PathBuf> {
        let url = self.endpoints.archive(sha);

        match ureq::head(&url).call() {
            Ok(_) => {}
            Err(ureq::Error::Status(_, _)) => {
                return Err(Error::ArtifactNotFound(sha.to_string()));
            }
            Err(e) => return Err(Error::Http(e.to_string())),
        }

        let response = match ureq::get(&url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, _)) => {
                return Err(Error::ArtifactNotFound(sha.to_string()));
            }
            Err(e) => return Err(Error::Http(e.to_string())),
        };

        let bob_dir = self.layout.bob_dir();
        std::fs::create_dir_all(&bob_dir)?;

        let total = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());
        let progress = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
                        .unwrap()
                        .progress_chars("=>-"),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };

        let mut reader = response.into_reader();
        let mut tmp = tempfile::NamedTempFile::new_in(&bob_dir)?;
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            tmp.write_all(&buf[..n])?;
            progress.inc(n as u64);
        }
        progress.finish_and_clear();

        let path = self.layout.artifact_path(sha);
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(path)
    }

    /// Current sha of the stable channel.
    pub fn latest(&self) -> Result<String> {
        Ok(self.fetch_channel(&self.endpoints.stable_info())?.sha1)
    }

    /// Current (sha, version) of the beta channel. A single value, no
    /// history.
    pub fn beta(&self) -> Result<(String, String)> {
        let info = self.fetch_channel(&self.endpoints.beta_info())?;
        Ok((info.sha1, info.version))
    }

    /// Translate a sha to its released version string.
    ///
    /// Falls back to the beta channel's current sha, then degrades to
    /// `"unknown"`. Never fatal for an unrecognized sha; network failure
    /// still is.
    pub fn version_of(&self, sha: &str) -> Result<String> {
        let manifest = self.fetch_manifest()?;
        if let Some(version) = manifest.version_for(sha) {
            return Ok(version.to_string());
        }

        let (beta_sha, beta_version) = self.beta()?;
        if beta_sha == sha {
            debug!("Sha {} matches the current beta", sha);
            return Ok(beta_version);
        }

        Ok(UNKNOWN_VERSION.to_string())
    }

    /// Translate a released version string to its sha, `None` when the
    /// manifest has no such version.
    pub fn hash_of(&self, version: &str) -> Result<Option<String>> {
        let manifest = self.fetch_manifest()?;
        Ok(manifest.sha_for(version).map(str::to_string))
    }

    fn fetch_manifest(&self) -> Result<VersionManifest> {
        self.fetch_json(&self.endpoints.versions_url)
    }

    fn fetch_channel(&self, url: &str) -> Result<ChannelInfo> {
        self.fetch_json(url)
    }

    fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = match ureq::get(url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) => {
                return Err(Error::Http(format!("HTTP {} from {}", code, url)));
            }
            Err(e) => return Err(Error::Http(e.to_string())),
        };
        let body = response.into_string()?;
        Ok(serde_json::from_str(&body)?)
    }
}
