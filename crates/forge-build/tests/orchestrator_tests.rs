//! Integration tests for phase orchestration
//!
//! Observes the issue sequence through the recording executor and asserts
//! the ordering contracts the orchestrator owes the incremental executor.

use forge_build::{
    BuildError, BuildResult, BuildStep, DryRunExecutor, ExecEvent, Executor, Orchestrator,
    ProcessExecutor, StepKind,
};
use forge_config::Manifest;
use std::path::PathBuf;

/// Two build types, one app module with a C and an assembly source,
/// hex + bin packaging, one external, one library dependency.
fn manifest() -> Manifest {
    toml::from_str(
        r#"
[builds]
DEBUG = "build/debug"
"OPT-SIZE" = "build/optimized/size"

[extensions]
GCC = [".c"]
GAS = [".S"]

[tools.bin.GCC]
ARM = "arm-none-eabi-gcc"
[tools.bin.GAS]
ARM = "arm-none-eabi-gcc"
[tools.bin.OBJ-COPY]
ARM = "arm-none-eabi-objcopy"

[options."GCC:GAS".arch.ARM]
cflags = ["-mthumb"]

[options."GCC:GAS".arch.ARM.cflags-for]
DEBUG = ["-Og", "-ggdb3"]
"OPT-SIZE" = ["-Os"]

[external.codegen]
make = [["python3", "tools/gen.py"]]

[source.hal]
arch = "ARM"
library = "libhal"
include = ["hal/include"]
defines = ["USE_HAL"]
src = ["hal/init.c"]
order = 1

[source.fw]
arch = "ARM"
src = ["a.c", "a.S"]
uses = ["hal"]
order = 2

[source.fw.app]
name = "fw.elf"
hex = "fw.hex"
bin = "fw.bin"
hex-flags = ["-O", "ihex"]
bin-flags = ["-O", "binary"]
"#,
    )
    .unwrap()
}

fn run_recorded(manifest: &Manifest) -> DryRunExecutor {
    let orchestrator = Orchestrator::new(manifest);
    let mut recorder = DryRunExecutor::new();
    orchestrator.build(&mut recorder).unwrap();
    recorder
}

/// Index of the first barrier at-or-after which `pred` first matches,
/// and the barrier index before it, for ordering assertions
fn positions(recorder: &DryRunExecutor, pred: impl Fn(&BuildStep) -> bool) -> Vec<usize> {
    recorder
        .events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            ExecEvent::Step(s) if pred(s) => Some(i),
            _ => None,
        })
        .collect()
}

fn barrier_positions(recorder: &DryRunExecutor) -> Vec<usize> {
    recorder
        .events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            ExecEvent::Barrier => Some(i),
            _ => None,
        })
        .collect()
}

#[test]
fn external_steps_resolve_before_any_source_step() {
    let manifest = manifest();
    let recorder = run_recorded(&manifest);

    let externals = positions(&recorder, |s| s.kind == StepKind::External);
    let source = positions(&recorder, |s| s.kind != StepKind::External);
    let barriers = barrier_positions(&recorder);

    assert_eq!(externals.len(), 1);
    let first_barrier = barriers[0];
    assert!(externals.iter().all(|&i| i < first_barrier));
    assert!(source.iter().all(|&i| i > first_barrier));
}

#[test]
fn objects_precede_links_precede_artifacts() {
    let manifest = manifest();
    let recorder = run_recorded(&manifest);

    let objects = positions(&recorder, |s| s.kind.is_object());
    let links = positions(&recorder, |s| s.kind == StepKind::Link);
    let copies = positions(&recorder, |s| matches!(s.kind, StepKind::Hex | StepKind::Bin));

    let last_object = *objects.last().unwrap();
    let first_link = *links.first().unwrap();
    let last_link = *links.last().unwrap();
    let first_copy = *copies.first().unwrap();

    assert!(last_object < first_link);
    assert!(last_link < first_copy);

    // A barrier separates each wave
    let barriers = barrier_positions(&recorder);
    assert!(barriers.iter().any(|&b| last_object < b && b < first_link));
    assert!(barriers.iter().any(|&b| last_link < b && b < first_copy));
}

#[test]
fn step_counts_match_the_manifest_shape() {
    let manifest = manifest();
    let recorder = run_recorded(&manifest);

    // 2 build types × 3 sources (hal/init.c, a.c, a.S)
    let objects = positions(&recorder, |s| s.kind.is_object());
    assert_eq!(objects.len(), 6);

    // 1 link per app module per build type
    let links = positions(&recorder, |s| s.kind == StepKind::Link);
    assert_eq!(links.len(), 2);

    // 1 object-copy per declared format per build type
    let copies = positions(&recorder, |s| matches!(s.kind, StepKind::Hex | StepKind::Bin));
    assert_eq!(copies.len(), 4);

    assert_eq!(recorder.steps().count(), 1 + 6 + 2 + 4);
}

#[test]
fn variant_flags_stay_inside_their_variant() {
    let manifest = manifest();
    let recorder = run_recorded(&manifest);

    for step in recorder.steps().filter(|s| s.kind.is_object()) {
        match step.buildtype.as_deref() {
            Some("DEBUG") => {
                assert!(step.args.contains(&"-Og".to_string()));
                assert!(!step.args.contains(&"-Os".to_string()));
            }
            Some("OPT-SIZE") => {
                assert!(step.args.contains(&"-Os".to_string()));
                assert!(!step.args.contains(&"-Og".to_string()));
            }
            other => panic!("object step without a variant: {other:?}"),
        }
    }
}

#[test]
fn order_hint_sequences_modules_within_a_wave() {
    let manifest = manifest();
    let recorder = run_recorded(&manifest);

    // hal (order 1) is issued before fw (order 2) in each variant's wave
    let steps: Vec<_> = recorder.steps().filter(|s| s.kind.is_object()).collect();
    for variant in ["DEBUG", "OPT-SIZE"] {
        let modules: Vec<_> = steps
            .iter()
            .filter(|s| s.buildtype.as_deref() == Some(variant))
            .map(|s| s.module.as_str())
            .collect();
        assert_eq!(modules, vec!["hal", "fw", "fw"]);
    }
}

#[test]
fn skipped_modules_never_appear_in_any_phase() {
    let mut manifest = manifest();
    manifest.skip.insert("hal".to_string());
    let recorder = run_recorded(&manifest);

    assert!(recorder.steps().all(|s| s.module != "hal"));

    // fw still uses hal's declaration: propagation is untouched by skip
    let fw_compile = recorder
        .steps()
        .find(|s| s.module == "fw" && s.kind == StepKind::Compile)
        .unwrap();
    assert!(fw_compile.args.contains(&"-DUSE_HAL".to_string()));
    assert!(fw_compile.args.contains(&"-Ihal/include".to_string()));
}

#[test]
fn skipped_external_is_filtered_too() {
    let mut manifest = manifest();
    manifest.skip.insert("codegen".to_string());
    let recorder = run_recorded(&manifest);

    assert!(recorder.steps().all(|s| s.kind != StepKind::External));
}

#[test]
fn unknown_uses_fails_before_anything_is_issued() {
    let mut manifest = manifest();
    let mut fw = manifest.module("fw").unwrap().clone();
    fw.uses.push("missing".to_string());
    manifest.source.insert("fw".to_string(), fw);

    let orchestrator = Orchestrator::new(&manifest);
    let mut recorder = DryRunExecutor::new();
    let err = orchestrator.build(&mut recorder).unwrap_err();

    assert!(matches!(err, BuildError::UnknownUses { .. }));
    assert!(recorder.events.is_empty());
}

#[test]
fn overlay_for_unknown_buildtype_fails_validation() {
    let mut manifest = manifest();
    let mut fw = manifest.module("fw").unwrap().clone();
    fw.defines_for
        .insert("RELEASE".to_string(), vec!["NDEBUG".to_string()]);
    manifest.source.insert("fw".to_string(), fw);

    let orchestrator = Orchestrator::new(&manifest);
    let err = orchestrator.validate().unwrap_err();
    assert!(matches!(err, BuildError::UnknownBuildType { .. }));
}

/// Executor that fails at the Nth barrier, recording everything issued
struct FailingExecutor {
    inner: DryRunExecutor,
    fail_at_barrier: usize,
    barriers_seen: usize,
}

impl Executor for FailingExecutor {
    fn run(&mut self, step: &BuildStep) -> BuildResult<()> {
        self.inner.run(step)
    }

    fn after(&mut self) -> BuildResult<()> {
        self.inner.after()?;
        self.barriers_seen += 1;
        if self.barriers_seen == self.fail_at_barrier {
            return Err(BuildError::StepFailed {
                step: "external codegen".to_string(),
                code: 1,
                stderr: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn autoclean(&mut self) -> BuildResult<()> {
        self.inner.autoclean()
    }
}

#[test]
fn failure_at_a_barrier_aborts_all_later_phases() {
    let manifest = manifest();
    let orchestrator = Orchestrator::new(&manifest);

    let mut executor = FailingExecutor {
        inner: DryRunExecutor::new(),
        fail_at_barrier: 1,
        barriers_seen: 0,
    };
    let err = orchestrator.build(&mut executor).unwrap_err();
    assert!(matches!(err, BuildError::StepFailed { .. }));

    // Only the external phase was issued; the failure stopped everything else
    assert!(executor.inner.steps().all(|s| s.kind == StepKind::External));
}

#[test]
fn full_build_through_the_process_executor() {
    // Bind every tool to `true` so the whole phase sequence actually runs
    let temp = tempfile::TempDir::new().unwrap();
    let manifest: Manifest = toml::from_str(
        r#"
[builds]
DEBUG = "build/debug"

[extensions]
GCC = [".c"]

[tools.bin.GCC]
ARM = "true"
[tools.bin.OBJ-COPY]
ARM = "true"

[external.prep]
make = [["true"]]

[source.fw]
arch = "ARM"
src = ["main.c"]

[source.fw.app]
name = "fw.elf"
hex = "fw.hex"
hex-flags = ["-O", "ihex"]
"#,
    )
    .unwrap();
    std::fs::write(temp.path().join("main.c"), "int main(void) { return 0; }").unwrap();

    let orchestrator = Orchestrator::new(&manifest);
    let mut executor = ProcessExecutor::new(temp.path(), 2, false).unwrap();
    let summary = orchestrator.build(&mut executor).unwrap();

    assert_eq!(summary.external_steps, 1);
    assert_eq!(summary.source_steps, 3); // compile + link + hex
    assert_eq!(summary.modules, 1);
    assert_eq!(summary.buildtypes, 1);
}

#[test]
fn plan_iterates_every_step_in_issue_order() {
    let manifest = manifest();
    let orchestrator = Orchestrator::new(&manifest);
    let plan = orchestrator.plan().unwrap();

    assert_eq!(plan.step_count(), 13);
    assert_eq!(plan.iter_steps().count(), 13);
    assert_eq!(
        plan.iter_steps().next().unwrap().executable,
        PathBuf::from("python3")
    );
}
