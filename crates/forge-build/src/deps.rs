//! `uses` dependency propagation
//!
//! Resolves a module's `uses` list into the include directories and
//! preprocessor defines exported by the referenced modules.
//!
//! Resolution is single-level as declared: the manifest author lists the
//! transitive closure explicitly, and the resolver does not chase `uses` of
//! `uses`. Referencing an undeclared module is a hard error caught during
//! validation, before any step is issued.

use crate::error::{BuildError, BuildResult};
use forge_config::{Manifest, ModuleConfig};
use std::path::PathBuf;

/// Effective compile environment contributed by used modules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileEnv {
    /// Include directories, first-seen order, exact duplicates removed
    pub includes: Vec<PathBuf>,
    /// Preprocessor defines, first-seen order, exact duplicates removed
    pub defines: Vec<String>,
}

/// Resolve a module's `uses` list against the manifest.
///
/// A used module contributes its declared `include` directories and base
/// `defines`; build-type overlays stay private to the module that declares
/// them. Skipped modules still contribute here — `skip` filters build
/// steps, not declarations.
pub fn resolve_uses(
    manifest: &Manifest,
    name: &str,
    module: &ModuleConfig,
) -> BuildResult<CompileEnv> {
    let mut env = CompileEnv::default();

    for dep_name in &module.uses {
        let dep = manifest
            .module(dep_name)
            .ok_or_else(|| BuildError::unknown_uses(name, dep_name))?;

        for include in &dep.include {
            // Exported include paths are relative to the exporting module's
            // source root; consumers see project-root-relative paths.
            let include = match dep.source_root() {
                Some(root) => root.join(include),
                None => include.clone(),
            };
            if !env.includes.contains(&include) {
                env.includes.push(include);
            }
        }
        for define in &dep.defines {
            if !env.defines.contains(define) {
                env.defines.push(define.clone());
            }
        }
    }

    Ok(env)
}
