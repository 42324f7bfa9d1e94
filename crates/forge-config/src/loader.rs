//! Manifest Loader
//!
//! Finds and loads `forge.toml`, walking up the directory tree from the
//! invocation directory the way build tools are expected to behave when run
//! from a subdirectory of the project.

use crate::manifest::Manifest;
use crate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Manifest file name searched for in each directory
pub const MANIFEST_FILE: &str = "forge.toml";

/// Manifest loader
pub struct ManifestLoader;

/// A loaded manifest together with the directory it was found in.
///
/// All relative paths in the manifest (sources, includes, output roots) are
/// interpreted relative to `project_root`.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub project_root: PathBuf,
}

impl ManifestLoader {
    /// Load the manifest governing `start_dir`, searching parent directories
    pub fn load_from_directory(start_dir: &Path) -> ConfigResult<LoadedManifest> {
        let manifest_path = Self::find_manifest(start_dir)?;
        Self::load_from_file(&manifest_path)
    }

    /// Load a manifest from an explicit file path
    pub fn load_from_file(manifest_path: &Path) -> ConfigResult<LoadedManifest> {
        let manifest = Manifest::load_from_file(manifest_path)?;
        let project_root = manifest_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(LoadedManifest {
            manifest,
            project_root,
        })
    }

    /// Walk up from `start_dir` until a manifest file is found
    pub fn find_manifest(start_dir: &Path) -> ConfigResult<PathBuf> {
        let mut current = start_dir.to_path_buf();

        loop {
            let candidate = current.join(MANIFEST_FILE);
            if candidate.exists() {
                return Ok(candidate);
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(ConfigError::NotFound(start_dir.to_path_buf())),
            }
        }
    }
}
