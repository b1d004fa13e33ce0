//! Common test utilities for defbuild integration tests.
//!
//! Provides `TestEnv` for isolated test environments that never touch the
//! user's `~/.builder/cache` directory or real devices.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with an isolated cache root and a scratch project.
///
/// Each `TestEnv` creates two temporary directories:
/// - `project_dir`: the Defold project the commands run against
/// - `cache_dir`: the cache root (via the `DEFBUILD_CACHE_DIR` env var)
///
/// The `defbuild()` method returns a `Command` that sets the cache override
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub cache_dir: TempDir,
    pub project_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            cache_dir: TempDir::new().unwrap(),
            project_dir: TempDir::new().unwrap(),
        }
    }

    /// Create an environment that already holds a minimal valid project file.
    pub fn with_project(title: &str) -> Self {
        let env = Self::new();
        env.write_project_file(&format!("[project]\ntitle = {}\n", title));
        env
    }

    /// Get a Command for the defbuild binary with the isolated cache root,
    /// running from the project directory.
    pub fn defbuild(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_defbuild"));
        cmd.current_dir(self.project_dir.path());
        cmd.env("DEFBUILD_CACHE_DIR", self.cache_dir.path());
        cmd
    }

    pub fn cache_path(&self) -> &Path {
        self.cache_dir.path()
    }

    pub fn project_path(&self) -> &Path {
        self.project_dir.path()
    }

    /// The project file written by `with_project`/`write_project_file`.
    pub fn project_file(&self) -> PathBuf {
        self.project_dir.path().join("game.project")
    }

    pub fn write_project_file(&self, content: &str) {
        std::fs::write(self.project_file(), content).unwrap();
    }

    /// The session file inside the isolated cache.
    pub fn session_file(&self) -> PathBuf {
        self.cache_dir.path().join("session")
    }

    pub fn read_session(&self) -> String {
        std::fs::read_to_string(self.session_file()).unwrap()
    }

    /// Seed the session file directly instead of going through the CLI.
    pub fn write_session(&self, content: &str) {
        std::fs::write(self.session_file(), content).unwrap();
    }

    /// Drop a fake cached build tool jar into the cache and return its path.
    pub fn seed_bob(&self, sha: &str) -> PathBuf {
        let bob_dir = self.cache_dir.path().join("bob");
        std::fs::create_dir_all(&bob_dir).unwrap();
        let jar = bob_dir.join(format!("bob_{}.jar", sha));
        std::fs::write(&jar, b"jar bytes").unwrap();
        jar
    }

    /// Write a stub executable named `name` that exits with `exit_code`,
    /// into a per-test bin directory suitable for prepending to `PATH`.
    #[cfg(unix)]
    pub fn stub_tool(&self, name: &str, exit_code: i32) -> PathBuf {
        let dir = self.bin_dir();
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\nexit {}\n", exit_code)).unwrap();
        make_executable(&path);
        dir
    }

    /// Like `stub_tool`, but the stub appends each invocation's arguments to
    /// a file. Returns the path of that file.
    #[cfg(unix)]
    pub fn stub_recording_tool(&self, name: &str) -> PathBuf {
        let dir = self.bin_dir();
        let args_file = dir.join(format!("{}_args.txt", name));
        let path = dir.join(name);
        std::fs::write(
            &path,
            format!("#!/bin/sh\necho \"$@\" >> \"{}\"\nexit 0\n", args_file.display()),
        )
        .unwrap();
        make_executable(&path);
        args_file
    }

    /// `PATH` value with the stub bin directory in front.
    #[cfg(unix)]
    pub fn tool_path(&self) -> String {
        format!(
            "{}:{}",
            self.bin_dir().display(),
            std::env::var("PATH").unwrap_or_default()
        )
    }

    #[cfg(unix)]
    fn bin_dir(&self) -> PathBuf {
        let dir = self.project_dir.path().join("bin");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}
