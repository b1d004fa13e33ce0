//! Defbuild - build, install and launch Defold projects from the command line.
//!
//! This library backs the `defbuild` CLI tool: it resolves a per-run build
//! context from the machine-level session file and the project's own
//! configuration, and manages locally cached versions of the Defold build
//! tool ("bob") fetched from the official download archive.

pub mod bob;
pub mod cli;
pub mod commands;
pub mod config;
pub mod paths;

/// Library-level error type for defbuild operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Ini(#[from] ini::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Can not find a project file in {}", .0.display())]
    ProjectFileNotFound(std::path::PathBuf),

    #[error("Found more than one project file in {}", .0.display())]
    AmbiguousProjectFile(std::path::PathBuf),

    #[error("No project.title set in {}", .0.display())]
    MissingTitle(std::path::PathBuf),

    #[error("No platform found, specify ios or android")]
    UnresolvedPlatform,

    #[error("Signing identity and provisioning profile must both be set for iOS, use 'defbuild set'")]
    MissingSigning,

    #[error("Can't find bob version {0}")]
    ArtifactNotFound(String),

    #[error("Unable to find version {0}")]
    VersionNotFound(String),

    #[error("Can't find a bob version, download with 'defbuild bob --update'")]
    NoArtifact,

    #[error("Unknown configuration field '{0}'")]
    UnknownField(String),

    #[error("No {0} build recorded for this project, run 'defbuild build' first")]
    MissingBuildOutput(&'static str),

    #[error("Can not find dependency {0}")]
    MissingDependency(String),

    #[error("{tool} exited with status {status}")]
    ToolFailed { tool: String, status: i32 },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for defbuild operations.
pub type Result<T> = std::result::Result<T, Error>;
