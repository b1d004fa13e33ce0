//! Precedence resolution for the per-run build context.
//!
//! A `BuildContext` is assembled from three tiers, highest first:
//!
//! 1. CLI flags (`ContextOverrides`)
//! 2. The session file's `config` section
//! 3. The project's `.project` file
//! 4. Built-in defaults
//!
//! Not every field exists in every tier: identity, provision and the build
//! tool path come only from the session; the title and bundle identifiers
//! come only from the project file; platform and output directory may come
//! from more than one tier. `resolve` is a pure function over already-loaded
//! inputs so the precedence rules are testable without touching the
//! filesystem.

use std::path::PathBuf;

use crate::config::schema::{DEFAULT_BUNDLE_ID, Platform, ProjectManifest, SessionConfig};
use crate::paths::CacheLayout;
use crate::{Error, Result};

/// CLI-sourced overrides, the highest precedence tier.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    /// Platform from a `-p/--platform` flag.
    pub platform: Option<Platform>,
}

impl ContextOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}

/// Fully resolved per-run build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Project title from the project file.
    pub project_name: String,
    /// Normalized build platform.
    pub platform: Platform,
    pub bundle_id_android: String,
    pub bundle_id_ios: String,
    /// Path of the selected build tool jar, if one has been set up.
    pub artifact_path: Option<PathBuf>,
    pub signing_identity: Option<String>,
    pub signing_provision: Option<String>,
    /// Where bundles are staged.
    pub output_dir: PathBuf,
    /// Bundle paths recorded by earlier builds of this project.
    pub last_android_build: Option<PathBuf>,
    pub last_ios_build: Option<PathBuf>,
}

/// Session-backed context fields the `set` verb may mutate.
///
/// A closed set: anything else is `UnknownField`, so typos never end up
/// persisted in the session file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextField {
    Identity,
    Provision,
    Platform,
    Output,
    Bob,
}

impl std::str::FromStr for ContextField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "identity" => Ok(ContextField::Identity),
            "provision" => Ok(ContextField::Provision),
            "platform" => Ok(ContextField::Platform),
            "output" => Ok(ContextField::Output),
            "bob" => Ok(ContextField::Bob),
            _ => Err(Error::UnknownField(s.to_string())),
        }
    }
}

impl BuildContext {
    /// Update one session-backed field, validating the value.
    ///
    /// On error the context is left untouched.
    pub fn set_field(&mut self, field: ContextField, value: &str) -> Result<()> {
        match field {
            ContextField::Identity => self.signing_identity = Some(value.to_string()),
            ContextField::Provision => self.signing_provision = Some(value.to_string()),
            ContextField::Platform => {
                self.platform = Platform::parse(value).ok_or(Error::UnresolvedPlatform)?;
            }
            ContextField::Output => self.output_dir = PathBuf::from(value),
            ContextField::Bob => self.artifact_path = Some(PathBuf::from(value)),
        }
        Ok(())
    }
}

/// Merge the three tiers into a `BuildContext` per the precedence table.
///
/// Fatal when no tier yields a usable platform; everything else falls back
/// to a default.
pub fn resolve(
    overrides: &ContextOverrides,
    session: &SessionConfig,
    manifest: &ProjectManifest,
    layout: &CacheLayout,
) -> Result<BuildContext> {
    // Platform: CLI flag wins, else the stored session value, which must
    // still normalize (the session may carry junk from older tools).
    let platform = if let Some(platform) = overrides.platform {
        platform
    } else if let Some(ref stored) = session.platform {
        Platform::parse(stored).ok_or(Error::UnresolvedPlatform)?
    } else {
        return Err(Error::UnresolvedPlatform);
    };

    // Output: session override, else the cache staging directory.
    let output_dir = session
        .output
        .clone()
        .unwrap_or_else(|| layout.output_dir());

    let record = session.projects.get(&manifest.title);

    Ok(BuildContext {
        project_name: manifest.title.clone(),
        platform,
        bundle_id_android: manifest
            .bundle_id_android
            .clone()
            .unwrap_or_else(|| DEFAULT_BUNDLE_ID.to_string()),
        bundle_id_ios: manifest
            .bundle_id_ios
            .clone()
            .unwrap_or_else(|| DEFAULT_BUNDLE_ID.to_string()),
        artifact_path: session.bob.clone(),
        signing_identity: session.identity.clone(),
        signing_provision: session.provision.clone(),
        output_dir,
        last_android_build: record.and_then(|r| r.android_build.clone()),
        last_ios_build: record.and_then(|r| r.ios_build.clone()),
    })
}
