//! Build command - resolve the manifest and drive the full phase sequence

use anyhow::{Context, Result};
use colored::Colorize;
use forge_build::{Orchestrator, ProcessExecutor};
use std::path::PathBuf;

/// Build command arguments
#[derive(Default)]
pub struct BuildArgs {
    /// Explicit manifest path
    pub manifest: Option<PathBuf>,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Run one step at a time
    pub sequential: bool,
    /// Echo executed commands
    pub debug: bool,
    /// Verbose phase progress
    pub verbose: bool,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let loaded = super::load_manifest(args.manifest)?;

    let jobs = if args.sequential {
        1
    } else {
        args.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    };

    let mut executor = ProcessExecutor::new(&loaded.project_root, jobs, args.debug)
        .context("Failed to create executor")?;

    let orchestrator = Orchestrator::new(&loaded.manifest).with_verbose(args.verbose);
    let summary = orchestrator.build(&mut executor).context("Build failed")?;

    println!(
        "{} {} modules, {} variants, {} steps in {:.2}s",
        "Build succeeded:".green().bold(),
        summary.modules,
        summary.buildtypes,
        summary.external_steps + summary.source_steps + summary.doc_steps,
        summary.total_time.as_secs_f64()
    );

    Ok(())
}
