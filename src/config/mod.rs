//! Configuration management for defbuild.
//!
//! Two tiers of INI configuration feed every project-tier verb:
//!
//! ## Session file - machine-level state
//!
//! Located at `<cache>/session` (see [`crate::paths::CacheLayout`]).
//! Contains a `config` section (`bob`, `identity`, `provision`, `platform`,
//! `output`) plus one section per project name recording bundle identifiers
//! and the last build outputs. Rewritten in full at the end of every run.
//!
//! ## Project file - per-project declaration
//!
//! The single `.project` file in the project directory. Contains the
//! required `project.title` and optional `ios`/`android`
//! `bundle_identifier` keys. An optional one-shot properties file can be
//! merged into it for a single run; the pre-merge content is snapshotted
//! and restored when the run finishes.
//!
//! ## Precedence
//!
//! CLI flag > session `config` section > project file > built-in default.
//!
//! Use the [`resolver`] module for the pure precedence function and the
//! [`store`] module for the on-disk lifecycle.

pub mod resolver;
pub mod schema;
pub mod store;

pub use resolver::{BuildContext, ContextField, ContextOverrides, resolve};
pub use schema::{DEFAULT_BUNDLE_ID, Platform, ProjectManifest, ProjectRecord, SessionConfig};
pub use store::{ConfigStore, find_project_file};
