//! Clean command - remove all recorded build outputs

use anyhow::{Context, Result};
use colored::Colorize;
use forge_build::{Executor, ProcessExecutor};
use std::path::PathBuf;

/// Run the clean command
pub fn run(manifest: Option<PathBuf>) -> Result<()> {
    let loaded = super::load_manifest(manifest)?;

    let mut executor =
        ProcessExecutor::new(&loaded.project_root, 1, false).context("Failed to create executor")?;
    executor.autoclean().context("Clean failed")?;

    println!("{}", "Cleaned build outputs".green());
    Ok(())
}
