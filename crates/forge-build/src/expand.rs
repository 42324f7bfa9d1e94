//! Module expansion: one concrete build pipeline per configured build type
//!
//! For each source file the expander selects the tool by extension, computes
//! the destination path under the build type's output root, and merges the
//! full option stack. App modules additionally get a link step and the
//! declared packaging steps (hex/bin object-copies, disassembly dump, UF2
//! conversion), each gated on its producing step by wave ordering.

use crate::deps::resolve_uses;
use crate::error::{BuildError, BuildResult};
use crate::options::OptionMerger;
use crate::step::{BuildStep, StepKind};
use crate::toolchain::{tool, ToolchainResolver};
use forge_config::{Manifest, ModuleConfig, SourceSpec};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One module's pipeline for one build type.
///
/// The vectors are ordered by dependency wave: every `objects` step must
/// resolve before `link` is issued, `link` before `artifacts`, and
/// `artifacts` before `conversions`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulePlan {
    pub module: String,
    pub buildtype: String,
    /// Compile/assemble steps, one per source file
    pub objects: Vec<BuildStep>,
    /// Link step for app modules
    pub link: Option<BuildStep>,
    /// Post-link artifacts reading the linked output (hex, bin, dump)
    pub artifacts: Vec<BuildStep>,
    /// Second-order artifacts reading a post-link artifact (uf2)
    pub conversions: Vec<BuildStep>,
}

impl ModulePlan {
    /// Total number of steps in the plan
    pub fn step_count(&self) -> usize {
        self.objects.len()
            + usize::from(self.link.is_some())
            + self.artifacts.len()
            + self.conversions.len()
    }

    /// All steps in issue order
    pub fn iter(&self) -> impl Iterator<Item = &BuildStep> {
        self.objects
            .iter()
            .chain(self.link.iter())
            .chain(self.artifacts.iter())
            .chain(self.conversions.iter())
    }
}

/// Expands module declarations into build steps
pub struct ModuleExpander<'a> {
    manifest: &'a Manifest,
    merger: OptionMerger<'a>,
    resolver: ToolchainResolver<'a>,
    /// Inverted extension registry: ".c" → "GCC"
    ext_to_tool: BTreeMap<String, String>,
}

impl<'a> ModuleExpander<'a> {
    /// Create an expander over a validated manifest
    pub fn new(manifest: &'a Manifest) -> Self {
        let mut ext_to_tool = BTreeMap::new();
        for (tool_id, exts) in &manifest.extensions {
            for ext in exts {
                ext_to_tool.insert(ext.clone(), tool_id.clone());
            }
        }

        Self {
            manifest,
            merger: OptionMerger::new(&manifest.options),
            resolver: ToolchainResolver::new(&manifest.tools),
            ext_to_tool,
        }
    }

    /// Expand one module for every configured build type
    pub fn expand_all(&self, name: &str) -> BuildResult<BTreeMap<String, ModulePlan>> {
        let mut plans = BTreeMap::new();
        for buildtype in self.manifest.builds.keys() {
            plans.insert(buildtype.clone(), self.expand(name, buildtype)?);
        }
        Ok(plans)
    }

    /// Expand one module for one build type
    pub fn expand(&self, name: &str, buildtype: &str) -> BuildResult<ModulePlan> {
        let module = self
            .manifest
            .module(name)
            .ok_or_else(|| BuildError::module_not_found(name))?;

        let outroot = self
            .manifest
            .buildtype_root(buildtype)
            .ok_or_else(|| BuildError::unknown_buildtype(buildtype, format!("module '{name}'")))?;

        let env = resolve_uses(self.manifest, name, module)?;
        let source_root = module.source_root();

        let mut plan = ModulePlan {
            module: name.to_string(),
            buildtype: buildtype.to_string(),
            objects: Vec::new(),
            link: None,
            artifacts: Vec::new(),
            conversions: Vec::new(),
        };

        for spec in &module.src {
            let file = spec.file();
            let ext = extension_key(file);
            let tool_id = self.ext_to_tool.get(&ext).ok_or_else(|| {
                BuildError::UnregisteredExtension {
                    ext: ext.clone(),
                    file: file.to_path_buf(),
                }
            })?;

            let executable = self.resolver.resolve(tool_id, &module.arch)?;
            let kind = if is_assembly(&ext) {
                StepKind::Assemble
            } else {
                StepKind::Compile
            };

            let merged = self.merger.merge(tool_id, &module.arch, Some(buildtype));
            let dest = object_destination(outroot, spec)?;
            let src_path = join_root(source_root, file);

            let mut args = merged.flags;
            for define in merged
                .defines
                .iter()
                .chain(&module.defines)
                .chain(module.defines_for.get(buildtype).into_iter().flatten())
                .chain(&env.defines)
            {
                args.push(format!("-D{define}"));
            }
            for include in &module.include {
                args.push(format!("-I{}", join_root(source_root, include).display()));
            }
            for include in &env.includes {
                args.push(format!("-I{}", include.display()));
            }
            for include in &module.sysinclude {
                args.push("-isystem".to_string());
                args.push(join_root(source_root, include).display().to_string());
            }
            if kind == StepKind::Assemble {
                if let Some(listing) = &module.listing {
                    let lst = dest.with_extension("lst");
                    args.push(format!("-Wa,{listing}={}", lst.display()));
                }
            }
            args.push("-c".to_string());
            args.push(src_path.display().to_string());
            args.push("-o".to_string());
            args.push(dest.display().to_string());

            plan.objects.push(
                BuildStep::new(name, Some(buildtype), kind, executable)
                    .with_args(args)
                    .with_inputs(vec![src_path])
                    .with_output(dest),
            );
        }

        if let Some(app) = &module.app {
            self.expand_app(name, module, buildtype, outroot, &mut plan, app)?;
        }

        Ok(plan)
    }

    /// Link and packaging steps for an app module
    fn expand_app(
        &self,
        name: &str,
        module: &ModuleConfig,
        buildtype: &str,
        outroot: &Path,
        plan: &mut ModulePlan,
        app: &forge_config::AppConfig,
    ) -> BuildResult<()> {
        if plan.objects.is_empty() {
            return Err(BuildError::NoSources {
                module: name.to_string(),
            });
        }

        let objects: Vec<PathBuf> = plan
            .objects
            .iter()
            .filter_map(|s| s.output.clone())
            .collect();

        // The LD binding drives the link when present; otherwise the
        // compiler driver does, with link flags passed through via -Wl.
        let driver = if self.resolver.is_configured(tool::LD, &module.arch) {
            self.resolver.resolve(tool::LD, &module.arch)?
        } else {
            self.resolver.resolve(tool::CC, &module.arch)?
        };

        let merged = self.merger.merge(tool::LD, &module.arch, Some(buildtype));
        let elf = outroot.join(&app.name);

        let mut args = merged.flags;
        for object in &objects {
            args.push(object.display().to_string());
        }
        args.push("-o".to_string());
        args.push(elf.display().to_string());
        if let Some(map) = &app.map {
            args.push(format!("-Wl,-Map={}", outroot.join(map).display()));
        }
        for flag in merged.ldflags.iter().chain(&module.ldflags) {
            args.push(format!("-Wl,{flag}"));
        }

        plan.link = Some(
            BuildStep::new(name, Some(buildtype), StepKind::Link, driver)
                .with_args(args)
                .with_inputs(objects)
                .with_output(elf.clone()),
        );

        for (artifact, flags, kind) in [
            (&app.hex, &app.hex_flags, StepKind::Hex),
            (&app.bin, &app.bin_flags, StepKind::Bin),
        ] {
            if let Some(artifact) = artifact {
                let objcopy = self.resolver.resolve(tool::OBJCOPY, &module.arch)?;
                let out = outroot.join(artifact);
                let mut args = flags.clone();
                args.push(elf.display().to_string());
                args.push(out.display().to_string());

                plan.artifacts.push(
                    BuildStep::new(name, Some(buildtype), kind, objcopy)
                        .with_args(args)
                        .with_inputs(vec![elf.clone()])
                        .with_output(out),
                );
            }
        }

        if let Some(dump) = &app.dump {
            let objdump = self.resolver.resolve(tool::OBJDUMP, &module.arch)?;
            let out = outroot.join(dump);
            let mut args = app.dump_flags.clone();
            args.push(elf.display().to_string());

            plan.artifacts.push(
                BuildStep::new(name, Some(buildtype), StepKind::Dump, objdump)
                    .with_args(args)
                    .with_inputs(vec![elf.clone()])
                    .with_output(out.clone())
                    .with_stdout_to(out),
            );
        }

        if let Some(uf2) = &app.uf2 {
            let Some(bin_name) = &app.bin else {
                return Err(BuildError::BuildFailed(format!(
                    "module '{name}': uf2 conversion requires a bin artifact"
                )));
            };
            let bin = outroot.join(bin_name);
            let converter = self.resolver.resolve(tool::UF2, &module.arch)?;
            let out = outroot.join(uf2);
            let mut args = app.uf2_flags.clone();
            args.push("-o".to_string());
            args.push(out.display().to_string());
            args.push(bin.display().to_string());

            plan.conversions.push(
                BuildStep::new(name, Some(buildtype), StepKind::Uf2, converter)
                    .with_args(args)
                    .with_inputs(vec![bin])
                    .with_output(out),
            );
        }

        Ok(())
    }
}

/// Extension lookup key for a source path (".c", ".S", ...); files without
/// an extension map to the empty key, which is never registered
fn extension_key(file: &Path) -> String {
    match file.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}

/// Assembly sources get the Assemble step kind (listing support)
fn is_assembly(ext: &str) -> bool {
    matches!(ext, ".S" | ".s" | ".asm")
}

/// Destination for an object file: output root ⊕ optional dest override ⊕
/// source path minus `strip` leading components, with `.o` appended.
///
/// `.o` is appended rather than substituted so `main.c` and `main.S`
/// in one directory cannot collide.
fn object_destination(outroot: &Path, spec: &SourceSpec) -> BuildResult<PathBuf> {
    let file = spec.file();
    let components: Vec<_> = file.iter().collect();

    if spec.strip() >= components.len() {
        return Err(BuildError::BadStripDepth {
            file: file.to_path_buf(),
            strip: spec.strip(),
        });
    }

    let mut dest = outroot.to_path_buf();
    if let Some(sub) = spec.dest() {
        dest.push(sub);
    }
    for component in &components[spec.strip()..] {
        dest.push(component);
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.set_file_name(format!("{file_name}.o"));
    Ok(dest)
}

fn join_root(root: Option<&Path>, path: &Path) -> PathBuf {
    match root {
        Some(root) => root.join(path),
        None => path.to_path_buf(),
    }
}
