//! Project discovery and the load/finalize lifecycle.
//!
//! `ConfigStore` owns everything a project-tier verb needs: the located
//! project file, the loaded session, and the one-shot override bookkeeping.
//! The lifecycle per run is `open` (locate + merge override) → `context`
//! (resolve the tiers) → verb runs → `finalize` (restore the override
//! backup, persist the session). `finalize` must run even when the verb or
//! the context resolution failed, so the project file is never left mutated
//! and the session always records the latest known-good fields.

use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::warn;

use crate::config::resolver::{self, BuildContext, ContextOverrides};
use crate::config::schema::{ProjectManifest, SessionConfig};
use crate::paths::CacheLayout;
use crate::{Error, Result};

/// Locate the single `.project` file in a directory.
///
/// Zero matches and more than one match are both fatal; silently picking one
/// of several project files would build the wrong project.
pub fn find_project_file(dir: &Path) -> Result<PathBuf> {
    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("project") {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(Error::ProjectFileNotFound(dir.to_path_buf())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousProjectFile(dir.to_path_buf())),
    }
}

/// Merge every section/key of the override document into the project file.
///
/// Override values win unconditionally, sections are created as needed and
/// nothing is removed. The result is written straight back to disk because
/// the build tool reads the project file independently and must observe the
/// merged values.
fn merge_properties(project_file: &Path, properties_file: &Path) -> Result<()> {
    let mut project = Ini::load_from_file(project_file)?;
    let properties = Ini::load_from_file(properties_file)?;

    for (section, props) in properties.iter() {
        for (key, value) in props.iter() {
            project.set_to(section, key.to_string(), value.to_string());
        }
    }

    project.write_to_file(project_file)?;
    Ok(())
}

/// Sibling path the project file is snapshotted to before an override merge.
fn backup_path(project_file: &Path) -> PathBuf {
    let mut name = project_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("_old");
    project_file.with_file_name(name)
}

/// Two-tier configuration store for one run of a project verb.
#[derive(Debug)]
pub struct ConfigStore {
    layout: CacheLayout,
    project_file: PathBuf,
    session: SessionConfig,
    backup: Option<PathBuf>,
}

impl ConfigStore {
    /// Open the store for a project directory: locate the project file, read
    /// or initialize the session, and apply the one-shot override if given.
    ///
    /// If the override merge fails the snapshot is restored before this
    /// returns, so an unreadable properties file cannot leave the project
    /// file mutated.
    pub fn open(
        project_dir: &Path,
        override_file: Option<&Path>,
        layout: &CacheLayout,
    ) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .map_err(|_| Error::ProjectFileNotFound(project_dir.to_path_buf()))?;
        let project_file = find_project_file(&project_dir)?;
        let session = SessionConfig::load_or_init(layout)?;

        let mut store = Self {
            layout: layout.clone(),
            project_file,
            session,
            backup: None,
        };

        if let Some(override_file) = override_file {
            if let Err(err) = store.apply_override(override_file) {
                if let Err(restore_err) = store.restore_override() {
                    warn!("Failed to restore project file: {}", restore_err);
                }
                return Err(err);
            }
        }

        Ok(store)
    }

    fn apply_override(&mut self, override_file: &Path) -> Result<()> {
        let backup = backup_path(&self.project_file);
        std::fs::copy(&self.project_file, &backup)?;
        self.backup = Some(backup);
        merge_properties(&self.project_file, override_file)
    }

    /// Resolve the per-run context from the session and project tiers.
    pub fn context(&self, overrides: &ContextOverrides) -> Result<BuildContext> {
        let manifest = ProjectManifest::load(&self.project_file)?;
        resolver::resolve(overrides, &self.session, &manifest, &self.layout)
    }

    /// Directory holding the project file; subprocesses run from here.
    pub fn project_dir(&self) -> &Path {
        self.project_file.parent().unwrap_or(Path::new("."))
    }

    pub fn project_file(&self) -> &Path {
        &self.project_file
    }

    /// Write the context back into the session and rewrite the session file.
    ///
    /// Sections belonging to other projects are carried over untouched from
    /// the session read at open time.
    pub fn persist(&mut self, ctx: &BuildContext) -> Result<()> {
        self.session.bob = ctx.artifact_path.clone();
        self.session.identity = ctx.signing_identity.clone();
        self.session.provision = ctx.signing_provision.clone();
        self.session.platform = Some(ctx.platform.as_str().to_string());
        self.session.output = Some(ctx.output_dir.clone());

        let record = self
            .session
            .projects
            .entry(ctx.project_name.clone())
            .or_default();
        record.android_id = Some(ctx.bundle_id_android.clone());
        record.ios_id = Some(ctx.bundle_id_ios.clone());
        if ctx.last_android_build.is_some() {
            record.android_build = ctx.last_android_build.clone();
        }
        if ctx.last_ios_build.is_some() {
            record.ios_build = ctx.last_ios_build.clone();
        }

        self.session.store(&self.layout)
    }

    /// Guaranteed cleanup: restore the override backup, then persist.
    ///
    /// The context is optional because resolution itself can fail; the
    /// project file is restored either way.
    pub fn finalize(&mut self, ctx: Option<&BuildContext>) -> Result<()> {
        let restored = self.restore_override();
        let persisted = match ctx {
            Some(ctx) => self.persist(ctx),
            None => Ok(()),
        };
        restored.and(persisted)
    }

    fn restore_override(&mut self) -> Result<()> {
        if let Some(backup) = self.backup.take() {
            if self.project_file.exists() {
                std::fs::remove_file(&self.project_file)?;
            }
            std::fs::rename(&backup, &self.project_file)?;
        }
        Ok(())
    }
}
