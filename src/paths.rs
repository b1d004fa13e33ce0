//! Cache directory layout.
//!
//! Everything defbuild persists lives under a single per-user cache root
//! (`~/.builder/cache` by default): the session file, downloaded build tool
//! jars, bundle output staging and the build report.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Environment override for the cache root, used by tests and non-standard
/// home setups.
pub const CACHE_DIR_ENV: &str = "DEFBUILD_CACHE_DIR";

/// Resolved cache directory layout. All paths are derived from the root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Create a layout rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the cache root: `DEFBUILD_CACHE_DIR` if set, otherwise
    /// `~/.builder/cache`.
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            return Ok(Self::new(dir));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not determine home directory".to_string()))?;
        Ok(Self::new(home.join(".builder").join("cache")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The session file holding machine-level state across runs.
    pub fn session_file(&self) -> PathBuf {
        self.root.join("session")
    }

    /// Default bundle output staging directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Directory holding downloaded build tool jars.
    pub fn bob_dir(&self) -> PathBuf {
        self.root.join("bob")
    }

    /// Deterministic cache path for the build tool jar with the given sha.
    pub fn artifact_path(&self, sha: &str) -> PathBuf {
        self.bob_dir().join(format!("bob_{}.jar", sha))
    }

    /// Location of the HTML build report written by the build tool.
    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.html")
    }

    /// Create the cache root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

/// Extract the sha out of a cached artifact filename (`bob_<sha>.jar`).
pub fn sha_from_artifact_path(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("bob_")?.strip_suffix(".jar")
}
