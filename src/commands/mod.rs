//! Command implementations for the defbuild CLI.
//!
//! Each verb works on the resolved `BuildContext` (or, for `bob`, on the
//! session alone) and otherwise shells out: `java` runs the build tool jar,
//! `adb` talks to Android devices, `ideviceinstaller` to iOS devices. The
//! tools are spawned, never linked; a missing binary surfaces as
//! `MissingDependency` at spawn time.

use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::bob::{self, ArtifactCache};
use crate::config::{BuildContext, ContextField, Platform, SessionConfig};
use crate::paths::{self, CacheLayout};
use crate::{Error, Result};

/// Android activity the engine exposes as the app entry point.
const DEFOLD_ACTIVITY: &str = "com.dynamo.android.DefoldActivity";

/// Engine variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    Debug,
    Release,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Debug => "debug",
            Variant::Release => "release",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flags accepted by the build verb.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub quick: bool,
    pub report: bool,
    pub variant: Variant,
}

/// Build tool flags selecting the engine variant.
///
/// Release 1.2.137 introduced `--variant` and `--strip-executable`; older
/// and unidentified jars only understand `--debug`.
fn variant_args(version: &str, variant: Variant) -> Vec<&'static str> {
    match semver::Version::parse(version) {
        Ok(v) if v >= semver::Version::new(1, 2, 137) => match variant {
            Variant::Debug => vec!["--variant", "debug"],
            Variant::Release => vec!["--strip-executable"],
        },
        _ => match variant {
            Variant::Debug => vec!["--debug"],
            Variant::Release => vec![],
        },
    }
}

/// Build and bundle the project with the configured build tool.
pub fn build(
    ctx: &mut BuildContext,
    project_dir: &Path,
    layout: &CacheLayout,
    cache: &ArtifactCache,
    opts: BuildOptions,
) -> Result<()> {
    let bob_jar = ctx.artifact_path.clone().ok_or(Error::NoArtifact)?;

    // The expected bundle path is recorded up front so even a failed run
    // persists where the bundle would have landed. The signing check also
    // happens here, before any network or subprocess cost.
    let signing = match ctx.platform {
        Platform::Android => {
            ctx.last_android_build = Some(
                ctx.output_dir
                    .join(&ctx.project_name)
                    .join(format!("{}.apk", ctx.project_name)),
            );
            None
        }
        Platform::Ios => {
            ctx.last_ios_build = Some(ctx.output_dir.join(format!("{}.ipa", ctx.project_name)));
            let identity = ctx.signing_identity.clone().ok_or(Error::MissingSigning)?;
            let provision = ctx.signing_provision.clone().ok_or(Error::MissingSigning)?;
            Some((identity, provision))
        }
    };

    let version = match paths::sha_from_artifact_path(&bob_jar) {
        Some(sha) => cache.version_of(sha)?,
        None => bob::UNKNOWN_VERSION.to_string(),
    };

    let mut cmd = Command::new("java");
    cmd.current_dir(project_dir)
        .arg("-jar")
        .arg(&bob_jar)
        .arg("--archive")
        .arg("--platform")
        .arg(ctx.platform.as_str())
        .arg("--texture-compression")
        .arg("true")
        .arg("--bundle-output")
        .arg(&ctx.output_dir);

    cmd.args(variant_args(&version, opts.variant));

    if opts.report {
        cmd.arg("--build-report-html").arg(layout.report_path());
    }

    if let Some((identity, provision)) = signing {
        cmd.arg("--identity").arg(identity).arg("-mp").arg(provision);
    }

    if !opts.quick {
        cmd.arg("distclean");
    }
    cmd.arg("build").arg("bundle");

    info!(
        "Building project {} as {} for {}",
        ctx.project_name,
        opts.variant,
        ctx.platform.short_name()
    );
    info!("Using bob version {}", version);

    let start = Instant::now();
    run_tool(&mut cmd)?;
    let elapsed = start.elapsed().as_secs();
    info!("Building done in {}:{:02}", elapsed / 60, elapsed % 60);

    if opts.report {
        info!("Build report written to {}", layout.report_path().display());
    }

    Ok(())
}

/// Install the last recorded build on a connected device.
pub fn install(ctx: &BuildContext, force: bool) -> Result<()> {
    if force {
        // A device without the app installed is not a failure; a missing
        // adb/ideviceinstaller binary still is.
        match uninstall(ctx) {
            Err(err @ Error::MissingDependency(_)) => return Err(err),
            Err(err) => warn!("Uninstall skipped: {}", err),
            Ok(()) => {}
        }
    }

    let (bundle, mut cmd) = match ctx.platform {
        Platform::Android => {
            let bundle = ctx
                .last_android_build
                .clone()
                .ok_or(Error::MissingBuildOutput("android"))?;
            let mut cmd = Command::new("adb");
            cmd.arg("install").arg(&bundle);
            (bundle, cmd)
        }
        Platform::Ios => {
            let bundle = ctx
                .last_ios_build
                .clone()
                .ok_or(Error::MissingBuildOutput("ios"))?;
            let mut cmd = Command::new("ideviceinstaller");
            cmd.arg("-i").arg(&bundle);
            (bundle, cmd)
        }
    };

    let name = bundle
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| bundle.display().to_string());
    info!("Installing {}", name);
    run_tool(&mut cmd)
}

/// Remove the project's app from a connected device.
pub fn uninstall(ctx: &BuildContext) -> Result<()> {
    let mut cmd = match ctx.platform {
        Platform::Android => {
            info!("Uninstalling {}", ctx.bundle_id_android);
            let mut cmd = Command::new("adb");
            cmd.arg("uninstall").arg(&ctx.bundle_id_android);
            cmd
        }
        Platform::Ios => {
            info!("Uninstalling {}", ctx.bundle_id_ios);
            let mut cmd = Command::new("ideviceinstaller");
            cmd.arg("-U").arg(&ctx.bundle_id_ios);
            cmd
        }
    };
    run_tool(&mut cmd)
}

/// Launch the app's main activity on a connected Android device.
pub fn start(ctx: &BuildContext) -> Result<()> {
    match ctx.platform {
        Platform::Android => {
            let mut cmd = Command::new("adb");
            cmd.arg("shell").arg("am").arg("start").arg("-n").arg(format!(
                "{}/{}",
                ctx.bundle_id_android, DEFOLD_ACTIVITY
            ));
            run_tool(&mut cmd)
        }
        Platform::Ios => Err(Error::Other(
            "Starting the app is not supported for iOS".to_string(),
        )),
    }
}

/// Stream the engine log from a connected Android device.
pub fn listen(ctx: &BuildContext) -> Result<()> {
    match ctx.platform {
        Platform::Android => {
            let mut cmd = Command::new("adb");
            cmd.arg("logcat").arg("-s").arg("defold");
            // logcat streams until the user interrupts it; its exit status
            // carries no signal worth failing on.
            stream_tool(&mut cmd)
        }
        Platform::Ios => Err(Error::Other(
            "Listening on the log is not supported for iOS".to_string(),
        )),
    }
}

/// Run the build tool's dependency resolution with user credentials.
pub fn resolve(ctx: &BuildContext, project_dir: &Path) -> Result<()> {
    let bob_jar = ctx.artifact_path.clone().ok_or(Error::NoArtifact)?;
    let email = prompt("User: ")?;
    let auth = prompt("Auth token: ")?;

    let mut cmd = Command::new("java");
    cmd.current_dir(project_dir)
        .arg("-jar")
        .arg(&bob_jar)
        .arg("--email")
        .arg(email)
        .arg("--auth")
        .arg(auth)
        .arg("resolve");
    run_tool(&mut cmd)
}

/// Update one session-backed configuration field on the context.
pub fn config_set(ctx: &mut BuildContext, key: &str, value: &str) -> Result<()> {
    let field: ContextField = key.parse()?;
    ctx.set_field(field, value)
}

/// Options accepted by the bob verb.
#[derive(Debug, Clone, Default)]
pub struct BobOptions {
    pub update: bool,
    pub set: Option<String>,
    pub force: bool,
}

/// Manage the cached build tool.
///
/// Session tier only: no project file is consulted and no platform needs to
/// resolve, so this works from any directory.
pub fn bob(layout: &CacheLayout, opts: &BobOptions) -> Result<()> {
    let mut session = SessionConfig::load_or_init(layout)?;
    let cache = ArtifactCache::new(layout.clone());

    if opts.update {
        let sha = cache.latest()?;
        select_artifact(&cache, &mut session, &sha, opts.force)?;
    } else if let Some(ref selector) = opts.set {
        let sha = resolve_selector(&cache, selector)?;
        select_artifact(&cache, &mut session, &sha, opts.force)?;
    } else {
        let jar = session.bob.clone().ok_or(Error::NoArtifact)?;
        let Some(sha) = paths::sha_from_artifact_path(&jar) else {
            return Err(Error::Other(format!(
                "Unrecognized bob artifact name: {}",
                jar.display()
            )));
        };
        let version = cache.version_of(sha)?;
        info!("Using version '{}', sha1: {}", version, sha);
    }

    session.store(layout)
}

/// Translate a `--set` argument into a sha.
///
/// A release version is looked up in the manifest (absence is fatal since
/// the user named it explicitly), `beta` takes the beta channel's current
/// sha, and a raw 40-hex sha passes straight through.
fn resolve_selector(cache: &ArtifactCache, selector: &str) -> Result<String> {
    if semver::Version::parse(selector).is_ok() {
        return cache
            .hash_of(selector)?
            .ok_or_else(|| Error::VersionNotFound(selector.to_string()));
    }
    if selector == "beta" {
        return Ok(cache.beta()?.0);
    }
    if bob::looks_like_sha(selector) {
        return Ok(selector.to_string());
    }
    Err(Error::Other(format!(
        "'{}' is not a release version, a sha1 or 'beta'",
        selector
    )))
}

fn select_artifact(
    cache: &ArtifactCache,
    session: &mut SessionConfig,
    sha: &str,
    force: bool,
) -> Result<()> {
    let version = cache.version_of(sha)?;
    if cache.is_cached(sha) && !force {
        session.bob = Some(cache.resolve(sha, false)?);
        info!("Using cached version {}", version);
    } else {
        info!("Downloading new bob {}", version);
        session.bob = Some(cache.resolve(sha, true)?);
        info!("Bob set to {}", version);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    write!(io::stderr(), "{}", label)?;
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Spawn an external tool and wait for it, mapping a missing binary to a
/// user-facing dependency error and a non-zero exit to `ToolFailed`.
fn run_tool(cmd: &mut Command) -> Result<()> {
    let tool = cmd.get_program().to_string_lossy().into_owned();
    let status = spawn_status(cmd, &tool)?;
    if !status.success() {
        return Err(Error::ToolFailed {
            tool,
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

/// Like `run_tool` but ignores the exit status, for tools that stream until
/// interrupted.
fn stream_tool(cmd: &mut Command) -> Result<()> {
    let tool = cmd.get_program().to_string_lossy().into_owned();
    spawn_status(cmd, &tool)?;
    Ok(())
}

fn spawn_status(cmd: &mut Command, tool: &str) -> Result<std::process::ExitStatus> {
    cmd.status().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::MissingDependency(tool.to_string())
        } else {
            Error::Io(e)
        }
    })
}
