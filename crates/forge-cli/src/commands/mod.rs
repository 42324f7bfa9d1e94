//! CLI command implementations

pub mod build;
pub mod clean;
pub mod plan;

use anyhow::{Context, Result};
use forge_build::discover;
use forge_config::loader::LoadedManifest;
use forge_config::ManifestLoader;
use std::path::PathBuf;

/// Load the manifest (explicit path or nearest forge.toml upwards) and
/// materialize its discovery specs against the project root
pub fn load_manifest(manifest: Option<PathBuf>) -> Result<LoadedManifest> {
    let mut loaded = match manifest {
        Some(path) => ManifestLoader::load_from_file(&path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            ManifestLoader::load_from_directory(&cwd).context("Failed to load manifest")?
        }
    };

    discover::materialize(&mut loaded.manifest, &loaded.project_root)
        .context("Source discovery failed")?;

    Ok(loaded)
}
