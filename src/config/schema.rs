//! Typed views of the INI documents defbuild reads and writes.
//!
//! This module provides:
//! - `Platform`: the normalized build platform enum
//! - `ProjectManifest`: the fields read from a project's `.project` file
//! - `SessionConfig`: the machine-level session file, one `config` section
//!   plus one section per project name
//!
//! The session file is rewritten in full at the end of every run; values that
//! are `None` are simply not written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use ini::{Ini, Properties};

use crate::paths::CacheLayout;
use crate::{Error, Result};

/// Bundle identifier used when a project file does not declare one.
pub const DEFAULT_BUNDLE_ID: &str = "com.example.todo";

/// Build platform, normalized to the wire strings the build tool expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// Parse from either the short CLI form or the stored wire string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "android" | "armv7-android" => Some(Platform::Android),
            "ios" | "armv7-darwin" => Some(Platform::Ios),
            _ => None,
        }
    }

    /// The wire string stored in the session and passed to the build tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "armv7-android",
            Platform::Ios => "armv7-darwin",
        }
    }

    /// Short human name for log lines.
    pub fn short_name(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fields defbuild reads from a `.project` file.
///
/// Only `project.title` is required; bundle identifiers are defaulted later
/// during context resolution so that precedence stays in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
    pub title: String,
    pub bundle_id_android: Option<String>,
    pub bundle_id_ios: Option<String>,
}

impl ProjectManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let doc = Ini::load_from_file(path)?;
        Self::from_ini(&doc, path)
    }

    pub fn from_ini(doc: &Ini, path: &Path) -> Result<Self> {
        let title = doc
            .section(Some("project"))
            .and_then(|s| s.get("title"))
            .ok_or_else(|| Error::MissingTitle(path.to_path_buf()))?;

        Ok(Self {
            title: title.to_string(),
            bundle_id_android: doc
                .section(Some("android"))
                .and_then(|s| s.get("bundle_identifier"))
                .map(str::to_string),
            bundle_id_ios: doc
                .section(Some("ios"))
                .and_then(|s| s.get("bundle_identifier"))
                .map(str::to_string),
        })
    }
}

/// Per-project record inside the session file.
///
/// The identifiers are write-only convenience entries (reads always come from
/// the project file); the build paths feed `install` on later runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRecord {
    pub android_id: Option<String>,
    pub ios_id: Option<String>,
    pub android_build: Option<PathBuf>,
    pub ios_build: Option<PathBuf>,
}

impl ProjectRecord {
    fn is_empty(&self) -> bool {
        self.android_id.is_none()
            && self.ios_id.is_none()
            && self.android_build.is_none()
            && self.ios_build.is_none()
    }
}

/// Machine-level session state persisted at `<cache>/session`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Path of the currently selected build tool jar.
    pub bob: Option<PathBuf>,
    /// iOS signing identity.
    pub identity: Option<String>,
    /// iOS provisioning profile path.
    pub provision: Option<String>,
    /// Last used platform, kept raw; normalization happens at resolve time.
    pub platform: Option<String>,
    /// Bundle output directory override.
    pub output: Option<PathBuf>,
    /// One record per project name.
    pub projects: BTreeMap<String, ProjectRecord>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the session file, creating an empty one (single `config` section)
    /// on first run.
    pub fn load_or_init(layout: &CacheLayout) -> Result<Self> {
        let path = layout.session_file();
        if !path.exists() {
            layout.ensure_root()?;
            let session = Self::new();
            session.store(layout)?;
            return Ok(session);
        }

        let doc = Ini::load_from_file(&path)?;
        Ok(Self::from_ini(&doc))
    }

    /// Full rewrite of the session file.
    pub fn store(&self, layout: &CacheLayout) -> Result<()> {
        layout.ensure_root()?;
        self.to_ini().write_to_file(layout.session_file())?;
        Ok(())
    }

    pub fn from_ini(doc: &Ini) -> Self {
        let mut session = Self::new();

        if let Some(config) = doc.section(Some("config")) {
            session.bob = config.get("bob").map(PathBuf::from);
            session.identity = config.get("identity").map(str::to_string);
            session.provision = config.get("provision").map(str::to_string);
            session.platform = config.get("platform").map(str::to_string);
            session.output = config.get("output").map(PathBuf::from);
        }

        for (name, props) in doc.iter() {
            let Some(name) = name else { continue };
            if name == "config" {
                continue;
            }
            session.projects.insert(
                name.to_string(),
                ProjectRecord {
                    android_id: props.get("android_id").map(str::to_string),
                    ios_id: props.get("ios_id").map(str::to_string),
                    android_build: props.get("android_build").map(PathBuf::from),
                    ios_build: props.get("ios_build").map(PathBuf::from),
                },
            );
        }

        session
    }

    pub fn to_ini(&self) -> Ini {
        let mut doc = Ini::new();

        // The config section is always present, even when empty, so a fresh
        // session file parses back to the same state it was written from.
        let config = doc
            .entry(Some("config".to_string()))
            .or_insert_with(Properties::new);
        if let Some(ref bob) = self.bob {
            config.insert("bob", bob.to_string_lossy());
        }
        if let Some(ref identity) = self.identity {
            config.insert("identity", identity.as_str());
        }
        if let Some(ref provision) = self.provision {
            config.insert("provision", provision.as_str());
        }
        if let Some(ref platform) = self.platform {
            config.insert("platform", platform.as_str());
        }
        if let Some(ref output) = self.output {
            config.insert("output", output.to_string_lossy());
        }

        for (name, record) in &self.projects {
            if record.is_empty() {
                continue;
            }
            let props = doc
                .entry(Some(name.clone()))
                .or_insert_with(Properties::new);
            if let Some(ref id) = record.android_id {
                props.insert("android_id", id.as_str());
            }
            if let Some(ref id) = record.ios_id {
                props.insert("ios_id", id.as_str());
            }
            if let Some(ref path) = record.android_build {
                props.insert("android_build", path.to_string_lossy());
            }
            if let Some(ref path) = record.ios_build {
                props.insert("ios_build", path.to_string_lossy());
            }
        }

        doc
    }
}
