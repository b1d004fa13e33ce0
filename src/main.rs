//! defbuild - build, install and launch Defold projects from the command line.

use std::path::Path;
use std::process;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use defbuild::bob::ArtifactCache;
use defbuild::cli::{Cli, Commands};
use defbuild::commands::{self, BobOptions, BuildOptions};
use defbuild::config::{BuildContext, ConfigStore, ContextOverrides, Platform};
use defbuild::paths::CacheLayout;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Default to info-level output; `-v` raises it to debug. `RUST_LOG`
/// directives still win for matching targets.
fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .without_time()
        .init();
}

fn run_command(command: Commands) -> defbuild::Result<()> {
    let layout = CacheLayout::resolve()?;

    match command {
        Commands::Build {
            project,
            platform,
            quick,
            options,
            report,
            variant,
        } => {
            let opts = BuildOptions {
                quick,
                report,
                variant,
            };
            with_project(
                &project,
                options.as_deref(),
                platform,
                &layout,
                |ctx, store, layout| {
                    let cache = ArtifactCache::new(layout.clone());
                    commands::build(ctx, store.project_dir(), layout, &cache, opts)
                },
            )
        }

        Commands::Install { platform, force } => {
            with_project(Path::new("."), None, platform, &layout, |ctx, _, _| {
                commands::install(ctx, force)
            })
        }

        Commands::Uninstall { platform } => {
            with_project(Path::new("."), None, platform, &layout, |ctx, _, _| {
                commands::uninstall(ctx)
            })
        }

        Commands::Start => with_project(Path::new("."), None, None, &layout, |ctx, _, _| {
            commands::start(ctx)
        }),

        Commands::Listen => with_project(Path::new("."), None, None, &layout, |ctx, _, _| {
            commands::listen(ctx)
        }),

        Commands::Resolve => with_project(Path::new("."), None, None, &layout, |ctx, store, _| {
            commands::resolve(ctx, store.project_dir())
        }),

        Commands::Set { key, value } => {
            with_project(Path::new("."), None, None, &layout, |ctx, _, _| {
                commands::config_set(ctx, &key, &value)
            })
        }

        Commands::Bob { update, set, force } => {
            let opts = BobOptions { update, set, force };
            commands::bob(&layout, &opts)
        }
    }
}

/// Run a project-tier verb with the full store lifecycle.
///
/// `finalize` runs whether the verb succeeded or not: the merged override is
/// reverted and, when a context resolved, the session is rewritten with it.
/// A cleanup failure never masks the verb's own error.
fn with_project<F>(
    project_dir: &Path,
    override_file: Option<&Path>,
    platform: Option<Platform>,
    layout: &CacheLayout,
    verb: F,
) -> defbuild::Result<()>
where
    F: FnOnce(&mut BuildContext, &ConfigStore, &CacheLayout) -> defbuild::Result<()>,
{
    let overrides = match platform {
        Some(platform) => ContextOverrides::new().with_platform(platform),
        None => ContextOverrides::new(),
    };

    let mut store = ConfigStore::open(project_dir, override_file, layout)?;

    let (result, ctx) = match store.context(&overrides) {
        Ok(mut ctx) => {
            let result = verb(&mut ctx, &store, layout);
            (result, Some(ctx))
        }
        Err(err) => (Err(err), None),
    };

    match (result, store.finalize(ctx.as_ref())) {
        (Ok(()), finalized) => finalized,
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup)) => {
            warn!("Cleanup failed: {}", cleanup);
            Err(err)
        }
    }
}
