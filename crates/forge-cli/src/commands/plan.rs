//! Plan command - print the resolved step sequence without executing

use anyhow::{Context, Result};
use colored::Colorize;
use forge_build::{DryRunExecutor, ExecEvent, Orchestrator};
use std::path::PathBuf;

/// Run the plan command
pub fn run(manifest: Option<PathBuf>) -> Result<()> {
    let loaded = super::load_manifest(manifest)?;

    let orchestrator = Orchestrator::new(&loaded.manifest);
    let mut recorder = DryRunExecutor::new();
    orchestrator
        .build(&mut recorder)
        .context("Manifest resolution failed")?;

    let mut issued = 0;
    for event in &recorder.events {
        match event {
            ExecEvent::Step(step) => {
                issued += 1;
                println!(
                    "{:>4}  {}  {}",
                    issued,
                    format!("[{}]", step.kind).cyan(),
                    step.command_line()
                );
            }
            ExecEvent::Barrier => {
                if issued > 0 {
                    println!("      {}", "--- barrier ---".dimmed());
                }
            }
        }
    }

    println!("{} {} steps", "Plan:".green().bold(), issued);
    Ok(())
}
