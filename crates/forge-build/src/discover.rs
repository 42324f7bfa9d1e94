//! Filesystem discovery for manifest `src-dirs` / `include-dirs` specs
//!
//! Runs once at manifest materialization time, before any expansion, so the
//! resolver itself stays purely functional over the manifest.

use crate::error::{BuildError, BuildResult};
use forge_config::{Manifest, SourceSpec};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All files under `dir` with the given extension (leading dot included),
/// sorted for stable ordering. Extension matching is case-sensitive: `.S`
/// (assembler-with-cpp) and `.s` are different languages.
pub fn all_files_in(dir: &Path, ext: &str, recursive: bool) -> BuildResult<Vec<PathBuf>> {
    let mut walker = WalkDir::new(dir);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| BuildError::BuildFailed(format!(
            "failed to scan {}: {e}",
            dir.display()
        )))?;
        if entry.file_type().is_file() && has_extension(entry.path(), ext) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// All directories under `dir` containing at least one file with the given
/// extension, sorted and de-duplicated. Used to turn a source tree into an
/// include path list.
pub fn all_directories_of(dir: &Path, ext: &str) -> BuildResult<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = all_files_in(dir, ext, true)?
        .into_iter()
        .filter_map(|f| f.parent().map(|p| p.to_path_buf()))
        .collect();

    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

/// Expand every module's discovery specs into concrete `src` and `include`
/// entries, relative to the project root. Discovery specs are consumed so a
/// materialized manifest is safe to expand repeatedly.
pub fn materialize(manifest: &mut Manifest, project_root: &Path) -> BuildResult<()> {
    for (name, module) in manifest.source.iter_mut() {
        let source_root = match module.source_root() {
            Some(p) => project_root.join(p),
            None => project_root.to_path_buf(),
        };

        for spec in std::mem::take(&mut module.src_dirs) {
            let scan_dir = source_root.join(&spec.dir);
            for file in all_files_in(&scan_dir, &spec.ext, spec.recursive)? {
                let relative = relativize(&file, &source_root, name)?;
                module.src.push(SourceSpec::Path(relative));
            }
        }

        for spec in std::mem::take(&mut module.include_dirs) {
            let scan_dir = source_root.join(&spec.dir);
            for dir in all_directories_of(&scan_dir, &spec.ext)? {
                let relative = relativize(&dir, &source_root, name)?;
                if !module.include.contains(&relative) {
                    module.include.push(relative);
                }
            }
        }
    }

    Ok(())
}

fn relativize(path: &Path, root: &Path, module: &str) -> BuildResult<PathBuf> {
    path.strip_prefix(root)
        .map(|p| p.to_path_buf())
        .map_err(|_| {
            BuildError::BuildFailed(format!(
                "discovered path {} for module '{module}' escapes the source root {}",
                path.display(),
                root.display()
            ))
        })
}

fn has_extension(path: &Path, ext: &str) -> bool {
    let wanted = ext.strip_prefix('.').unwrap_or(ext);
    path.extension()
        .map(|e| e.to_string_lossy() == wanted)
        .unwrap_or(false)
}
