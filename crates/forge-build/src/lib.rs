//! Forge build resolution and dispatch
//!
//! Turns a validated manifest into concrete toolchain invocations:
//! - Option merging across tool/architecture/build-type layers
//! - `uses` dependency propagation (includes and defines)
//! - Module expansion into per-build-type step pipelines
//! - Phase orchestration with executor barriers
//! - Toolchain resolution (tool id × architecture → executable)
//! - An incremental process executor with content-hash skip
//!
//! The resolver side is purely functional over the manifest: it computes a
//! step list and performs no I/O beyond path composition. All command
//! execution goes through the [`Executor`] trait.

pub mod cache;
pub mod deps;
pub mod discover;
pub mod error;
pub mod executor;
pub mod expand;
pub mod options;
pub mod orchestrator;
pub mod step;
pub mod toolchain;

// Re-export main types
pub use cache::{fingerprint_step, BuildCache};
pub use deps::{resolve_uses, CompileEnv};
pub use error::{BuildError, BuildResult};
pub use executor::{DryRunExecutor, ExecEvent, Executor, ProcessExecutor};
pub use expand::{ModuleExpander, ModulePlan};
pub use options::{MergedOptions, OptionMerger};
pub use orchestrator::{BuildPlan, BuildSummary, Orchestrator, Phase};
pub use step::{BuildStep, StepKind};
pub use toolchain::{tool, ToolchainResolver};

// Re-export the manifest types for convenience
pub use forge_config::{Manifest, ModuleConfig};
