use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Forge embedded cross-compilation build tool.
///
/// Forge resolves a declarative manifest (forge.toml) into ordered toolchain
/// invocations — compile, assemble, link, object-copy, format conversion —
/// one pipeline per configured build variant, and runs them through an
/// incremental executor that skips unchanged steps.
///
/// EXAMPLES:
///     forge                        Build every configured variant
///     forge build --jobs 8         Build with eight parallel jobs
///     forge plan                   Show the resolved steps without running
///     forge clean                  Remove all build outputs
///
/// ENVIRONMENT VARIABLES:
///     FORGE_JOBS    Default for --jobs
///     NO_COLOR      Set to disable colored output
#[derive(Parser)]
#[command(name = "forge")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the manifest (default: nearest forge.toml upwards)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full build: externals, sources, packaging, docs
    ///
    /// Resolves and validates the whole manifest first; nothing runs if any
    /// reference fails to resolve. Unchanged steps are skipped.
    ///
    /// EXAMPLES:
    ///     forge build                  Build every configured variant
    ///     forge build --sequential     One job at a time
    ///     forge build --debug          Echo every command as it runs
    #[command(visible_alias = "b")]
    Build {
        /// Number of parallel jobs (default: available CPUs)
        #[arg(long, short = 'j', env = "FORGE_JOBS")]
        jobs: Option<usize>,
        /// Run one step at a time (shorthand for --jobs 1)
        #[arg(long)]
        sequential: bool,
        /// Echo executed commands
        #[arg(long)]
        debug: bool,
        /// Verbose phase progress
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Show the resolved build plan without executing anything
    ///
    /// EXAMPLES:
    ///     forge plan                   List every step in issue order
    Plan,

    /// Remove all build outputs and the fingerprint cache
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build {
            jobs,
            sequential,
            debug,
            verbose,
        }) => commands::build::run(commands::build::BuildArgs {
            manifest: cli.manifest,
            jobs,
            sequential,
            debug,
            verbose,
        }),
        Some(Commands::Plan) => commands::plan::run(cli.manifest),
        Some(Commands::Clean) => commands::clean::run(cli.manifest),
        // No subcommand: run the default full build, like `forge build`
        None => commands::build::run(commands::build::BuildArgs {
            manifest: cli.manifest,
            ..Default::default()
        }),
    }
}
