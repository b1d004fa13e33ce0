//! CLI argument definitions for defbuild.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::Variant;
use crate::config::Platform;

/// Defbuild - build, install and launch Defold projects.
#[derive(Parser, Debug)]
#[command(name = "defbuild")]
#[command(author, version, about = "Commandline tool to build a Defold project", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a Defold project
    Build {
        /// Working directory of the project
        project: PathBuf,

        /// Which platform to build for
        #[arg(short, long, value_enum)]
        platform: Option<Platform>,

        /// Do a quick build by skipping distclean
        #[arg(short, long)]
        quick: bool,

        /// Read options from a properties file; they are merged into the
        /// project file for this run only and reverted afterwards
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Write an HTML build report to the cache directory
        #[arg(short, long)]
        report: bool,

        /// Engine variant to build
        #[arg(long, value_enum, default_value_t = Variant::Debug)]
        variant: Variant,
    },

    /// Install the last build on a connected device
    Install {
        /// Which platform to install
        #[arg(short, long, value_enum)]
        platform: Option<Platform>,

        /// Force installation by uninstalling first
        #[arg(short, long)]
        force: bool,
    },

    /// Uninstall the project from a connected device
    Uninstall {
        /// Which platform to uninstall
        #[arg(short, long, value_enum)]
        platform: Option<Platform>,
    },

    /// Launch the installed app on a connected Android device
    Start,

    /// Stream the engine log from a connected Android device
    Listen,

    /// Resolve external library dependencies with the build tool
    Resolve,

    /// Update a session configuration field
    ///
    /// Recognized fields: identity, provision, platform, output, bob.
    Set {
        /// Field to update
        key: String,

        /// The value to assign
        value: String,
    },

    /// Update or pin the version of bob that is used
    Bob {
        /// Download the latest stable version
        #[arg(short, long)]
        update: bool,

        /// Pin a specific version, a raw sha1 or 'beta'
        #[arg(long = "set", value_name = "VERSION")]
        set: Option<String>,

        /// Force a re-download even when already cached
        #[arg(short, long)]
        force: bool,
    },
}
