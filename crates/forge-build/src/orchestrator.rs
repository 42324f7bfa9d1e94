//! Phase orchestration
//!
//! Drives the strict phase sequence through an injected executor:
//! `EXTERNAL → SOURCE → PACKAGE → DOCS`, with a barrier after each phase
//! and between dependent waves inside the source phase. The whole manifest
//! is resolved and validated before the first step is issued, so a bad
//! reference never surfaces mid-build.

use crate::error::{BuildError, BuildResult};
use crate::executor::Executor;
use crate::expand::{ModuleExpander, ModulePlan};
use crate::step::{BuildStep, StepKind};
use crate::toolchain::{tool, ToolchainResolver};
use forge_config::Manifest;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Build phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// External/preliminary builds
    External,
    /// Main module compiles, links, and packaging artifacts
    Source,
    /// Post-build packaging hook
    Package,
    /// Documentation generation
    Docs,
}

impl Phase {
    /// Get the phase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Source => "source",
            Self::Package => "package",
            Self::Docs => "docs",
        }
    }

    /// All phases in execution order
    pub fn all() -> [Phase; 4] {
        [Self::External, Self::Source, Self::Package, Self::Docs]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fully resolved build plan, computed before anything is issued
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// External commands, ordered by their `order` hint
    pub externals: Vec<BuildStep>,
    /// Per build type: module plans ordered by the modules' `order` hints
    pub source: Vec<(String, Vec<ModulePlan>)>,
    /// Documentation steps
    pub docs: Vec<BuildStep>,
}

impl BuildPlan {
    /// Total number of steps across all phases
    pub fn step_count(&self) -> usize {
        self.externals.len()
            + self
                .source
                .iter()
                .map(|(_, plans)| plans.iter().map(ModulePlan::step_count).sum::<usize>())
            .sum::<usize>()
            + self.docs.len()
    }

    /// All steps grouped by phase, then by build type and module.
    /// Barrier placement is the orchestrator's concern, not the plan's.
    pub fn iter_steps(&self) -> impl Iterator<Item = &BuildStep> {
        self.externals
            .iter()
            .chain(
                self.source
                    .iter()
                    .flat_map(|(_, plans)| plans.iter().flat_map(ModulePlan::iter)),
            )
            .chain(self.docs.iter())
    }
}

/// Statistics from a completed build
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Steps issued in the external phase
    pub external_steps: usize,
    /// Steps issued in the source phase
    pub source_steps: usize,
    /// Steps issued in the docs phase
    pub doc_steps: usize,
    /// Modules built (skip already applied)
    pub modules: usize,
    /// Configured build types
    pub buildtypes: usize,
    /// Wall-clock time
    pub total_time: Duration,
}

/// Sequences the resolved plan through an executor
pub struct Orchestrator<'a> {
    manifest: &'a Manifest,
    expander: ModuleExpander<'a>,
    verbose: bool,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over a materialized manifest
    pub fn new(manifest: &'a Manifest) -> Self {
        Self {
            manifest,
            expander: ModuleExpander::new(manifest),
            verbose: false,
        }
    }

    /// Enable progress output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validate the whole manifest without issuing anything
    pub fn validate(&self) -> BuildResult<()> {
        self.plan().map(|_| ())
    }

    /// Resolve the complete build plan.
    ///
    /// Expanding every non-skipped module for every build type doubles as
    /// whole-manifest validation: unknown references, unregistered
    /// extensions, and unconfigured tools all surface here.
    pub fn plan(&self) -> BuildResult<BuildPlan> {
        self.check_overlay_keys()?;

        let mut externals = Vec::new();
        let mut ext_entries: Vec<_> = self
            .manifest
            .external
            .iter()
            .filter(|(name, _)| !self.manifest.is_skipped(name))
            .collect();
        ext_entries.sort_by(|a, b| (a.1.order, a.0).cmp(&(b.1.order, b.0)));

        for (name, cfg) in ext_entries {
            for cmd in &cfg.make {
                let mut step = BuildStep::new(
                    name.as_str(),
                    None,
                    StepKind::External,
                    PathBuf::from(&cmd[0]),
                )
                .with_args(cmd[1..].to_vec());
                if let Some(basedir) = &cfg.basedir {
                    step = step.with_cwd(basedir.clone());
                }
                externals.push(step);
            }
        }

        let mut modules: Vec<_> = self
            .manifest
            .source
            .iter()
            .filter(|(name, _)| !self.manifest.is_skipped(name))
            .collect();
        modules.sort_by(|a, b| (a.1.order, a.0).cmp(&(b.1.order, b.0)));

        let mut source = Vec::new();
        for buildtype in self.manifest.builds.keys() {
            let mut plans = Vec::new();
            for (name, _) in &modules {
                plans.push(self.expander.expand(name, buildtype)?);
            }
            source.push((buildtype.clone(), plans));
        }

        Ok(BuildPlan {
            externals,
            source,
            docs: self.doc_steps()?,
        })
    }

    /// Run the full phase sequence through the executor.
    ///
    /// An executor error aborts the current phase at its barrier; nothing
    /// from a later phase is issued after a failure.
    pub fn build(&self, executor: &mut dyn Executor) -> BuildResult<BuildSummary> {
        let start = Instant::now();

        // Fail fast: the whole manifest resolves before any step is issued
        let plan = self.plan()?;

        // External phase: preliminary builds complete before any source step
        self.announce(Phase::External, plan.externals.len());
        for step in &plan.externals {
            executor.run(step)?;
        }
        executor.after()?;

        // Source phase, issued in dependency waves with a barrier between:
        // objects → links → post-link artifacts → conversions
        let source_steps = plan
            .source
            .iter()
            .map(|(_, plans)| plans.iter().map(ModulePlan::step_count).sum::<usize>())
            .sum::<usize>();
        self.announce(Phase::Source, source_steps);

        for (_, plans) in &plan.source {
            for module_plan in plans {
                for step in &module_plan.objects {
                    executor.run(step)?;
                }
            }
        }
        executor.after()?;

        for (_, plans) in &plan.source {
            for module_plan in plans {
                if let Some(link) = &module_plan.link {
                    executor.run(link)?;
                }
            }
        }
        executor.after()?;

        for (_, plans) in &plan.source {
            for module_plan in plans {
                for step in &module_plan.artifacts {
                    executor.run(step)?;
                }
            }
        }
        executor.after()?;

        for (_, plans) in &plan.source {
            for module_plan in plans {
                for step in &module_plan.conversions {
                    executor.run(step)?;
                }
            }
        }
        executor.after()?;

        // Package phase: per-app packaging already happened above; the
        // barrier keeps the phase contract observable for extensions
        self.announce(Phase::Package, 0);
        executor.after()?;

        // Docs phase, gated on everything before it
        self.announce(Phase::Docs, plan.docs.len());
        for step in &plan.docs {
            executor.run(step)?;
        }
        executor.after()?;

        Ok(BuildSummary {
            external_steps: plan.externals.len(),
            source_steps,
            doc_steps: plan.docs.len(),
            modules: self
                .manifest
                .source
                .keys()
                .filter(|name| !self.manifest.is_skipped(name))
                .count(),
            buildtypes: self.manifest.builds.len(),
            total_time: start.elapsed(),
        })
    }

    /// Build-type references in overlay tables must name registered types.
    /// The typed tables make a variant-name typo detectable; catch it here
    /// instead of leaving a silently unused overlay.
    fn check_overlay_keys(&self) -> BuildResult<()> {
        for (key, group) in &self.manifest.options {
            for (arch_name, arch) in &group.arch {
                for bt in arch.cflags_for.keys().chain(arch.ldflags_for.keys()) {
                    if !self.manifest.builds.contains_key(bt) {
                        return Err(BuildError::unknown_buildtype(
                            bt,
                            format!("options.{key}.arch.{arch_name}"),
                        ));
                    }
                }
            }
        }

        for (name, module) in &self.manifest.source {
            for bt in module.defines_for.keys() {
                if !self.manifest.builds.contains_key(bt) {
                    return Err(BuildError::unknown_buildtype(bt, format!("source.{name}")));
                }
            }
        }

        Ok(())
    }

    fn doc_steps(&self) -> BuildResult<Vec<BuildStep>> {
        let resolver = ToolchainResolver::new(&self.manifest.tools);
        if self.manifest.docs.is_empty() || !resolver.is_configured(tool::DOC, tool::GEN) {
            return Ok(Vec::new());
        }

        let generator = resolver.resolve(tool::DOC, tool::GEN)?;
        Ok(self
            .manifest
            .docs
            .iter()
            .map(|doc| {
                BuildStep::new("docs", None, StepKind::Doc, generator.clone())
                    .with_args(vec![doc.display().to_string()])
                    .with_inputs(vec![doc.clone()])
            })
            .collect())
    }

    fn announce(&self, phase: Phase, steps: usize) {
        if self.verbose {
            println!("Phase {}: {} steps", phase, steps);
        }
    }
}
