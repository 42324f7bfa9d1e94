//! Executor interface and implementations
//!
//! The orchestrator issues steps through the [`Executor`] trait and never
//! talks to processes directly. `run` enqueues one invocation (subject to
//! incremental skip), `after` is the barrier that drains everything issued
//! so far, `autoclean` removes every recorded build output.

use crate::cache::{fingerprint_step, step_key, BuildCache, CacheEntry};
use crate::error::{BuildError, BuildResult};
use crate::step::BuildStep;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Build step sink with barrier semantics
pub trait Executor {
    /// Issue one toolchain invocation
    fn run(&mut self, step: &BuildStep) -> BuildResult<()>;

    /// Barrier: every issued step must resolve (run or skip) before this
    /// returns; an error here means at least one step failed
    fn after(&mut self) -> BuildResult<()>;

    /// Remove all build outputs this executor knows about
    fn autoclean(&mut self) -> BuildResult<()>;
}

/// One observed executor event, for plan display and ordering assertions
#[derive(Debug, Clone, PartialEq)]
pub enum ExecEvent {
    Step(BuildStep),
    Barrier,
}

/// Executor that records the issue sequence without running anything.
///
/// Backs `forge plan` and the orchestration tests.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    pub events: Vec<ExecEvent>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded steps, in issue order
    pub fn steps(&self) -> impl Iterator<Item = &BuildStep> {
        self.events.iter().filter_map(|e| match e {
            ExecEvent::Step(s) => Some(s),
            ExecEvent::Barrier => None,
        })
    }

    pub fn barrier_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ExecEvent::Barrier))
            .count()
    }
}

impl Executor for DryRunExecutor {
    fn run(&mut self, step: &BuildStep) -> BuildResult<()> {
        self.events.push(ExecEvent::Step(step.clone()));
        Ok(())
    }

    fn after(&mut self) -> BuildResult<()> {
        self.events.push(ExecEvent::Barrier);
        Ok(())
    }

    fn autoclean(&mut self) -> BuildResult<()> {
        Ok(())
    }
}

/// Incremental process executor.
///
/// Steps enqueue on `run` and drain at the next `after` barrier on a worker
/// pool; independent steps of one wave run in parallel. A step whose
/// fingerprint (command line + input contents) matches the cache and whose
/// output still exists is skipped.
pub struct ProcessExecutor {
    project_root: PathBuf,
    pool: rayon::ThreadPool,
    echo: bool,
    pending: Vec<BuildStep>,
    cache: BuildCache,
    cache_path: PathBuf,
}

impl ProcessExecutor {
    /// Cache location relative to the project root
    pub const CACHE_FILE: &'static str = ".forge/fingerprints.json";

    /// Create an executor rooted at the project directory
    pub fn new(project_root: &Path, jobs: usize, echo: bool) -> BuildResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build()
            .map_err(|e| BuildError::BuildFailed(format!("failed to create worker pool: {e}")))?;

        let cache_path = project_root.join(Self::CACHE_FILE);
        let cache = BuildCache::load(&cache_path);

        Ok(Self {
            project_root: project_root.to_path_buf(),
            pool,
            echo,
            pending: Vec::new(),
            cache,
            cache_path,
        })
    }

    fn in_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Run one step unless the cache proves it unnecessary.
    /// Returns the cache update for a step that ran, `None` for a skip.
    fn execute(&self, step: &BuildStep) -> BuildResult<Option<(String, CacheEntry)>> {
        let fingerprint = fingerprint_step(step, &self.project_root);
        let key = step_key(step);

        let output_present = step
            .output
            .as_ref()
            .map(|o| self.in_root(o).exists())
            .unwrap_or(true);
        if output_present && self.cache.is_fresh(&key, &fingerprint) {
            if self.echo {
                println!("  skip {}", step.describe());
            }
            return Ok(None);
        }

        if let Some(output) = &step.output {
            let path = self.in_root(output);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
        }

        if self.echo {
            println!("  {}", step.command_line());
        }

        let cwd = match &step.cwd {
            Some(cwd) => self.in_root(cwd),
            None => self.project_root.clone(),
        };
        let output = Command::new(&step.executable)
            .args(&step.args)
            .current_dir(cwd)
            .output()
            .map_err(|e| {
                BuildError::BuildFailed(format!(
                    "failed to spawn {}: {e}",
                    step.executable.display()
                ))
            })?;

        if !output.status.success() {
            return Err(BuildError::StepFailed {
                step: step.describe(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        if let Some(stdout_to) = &step.stdout_to {
            let path = self.in_root(stdout_to);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            fs::write(&path, &output.stdout).map_err(|e| BuildError::io(path.clone(), e))?;
        } else if !output.stdout.is_empty() {
            print!("{}", String::from_utf8_lossy(&output.stdout));
        }

        Ok(Some((
            key,
            CacheEntry {
                fingerprint,
                output: step.output.clone(),
            },
        )))
    }
}

impl Executor for ProcessExecutor {
    fn run(&mut self, step: &BuildStep) -> BuildResult<()> {
        self.pending.push(step.clone());
        Ok(())
    }

    fn after(&mut self) -> BuildResult<()> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let results: Vec<BuildResult<Option<(String, CacheEntry)>>> = self
            .pool
            .install(|| pending.par_iter().map(|step| self.execute(step)).collect());

        // Cache the steps that did run even when a sibling failed, then
        // surface the first failure.
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some((key, entry))) => self.cache.record(key, entry),
                Ok(None) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.cache
            .store(&self.cache_path)
            .map_err(|e| BuildError::io(self.cache_path.clone(), e))?;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn autoclean(&mut self) -> BuildResult<()> {
        let outputs: Vec<PathBuf> = self.cache.outputs().map(|p| p.to_path_buf()).collect();
        for output in outputs {
            let path = self.in_root(&output);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| BuildError::io(path.clone(), e))?;
            }
        }

        self.cache.clear();
        if self.cache_path.exists() {
            fs::remove_file(&self.cache_path).map_err(|e| BuildError::io(self.cache_path.clone(), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn copy_step(src: &str, dst: &str) -> BuildStep {
        BuildStep::new("m", Some("DEBUG"), StepKind::Compile, PathBuf::from("cp"))
            .with_args(vec![src.to_string(), dst.to_string()])
            .with_inputs(vec![PathBuf::from(src)])
            .with_output(PathBuf::from(dst))
    }

    #[test]
    fn test_run_is_deferred_until_after() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.c"), "one").unwrap();

        let mut exec = ProcessExecutor::new(temp.path(), 2, false).unwrap();
        exec.run(&copy_step("a.c", "out/a.c.o")).unwrap();
        assert!(!temp.path().join("out/a.c.o").exists());

        exec.after().unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("out/a.c.o")).unwrap(), "one");
    }

    #[test]
    fn test_unchanged_step_is_skipped_at_next_barrier() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.c"), "one").unwrap();

        let mut exec = ProcessExecutor::new(temp.path(), 1, false).unwrap();
        exec.run(&copy_step("a.c", "a.c.o")).unwrap();
        exec.after().unwrap();

        // Tamper with the output; a skipped step must not restore it
        fs::write(temp.path().join("a.c.o"), "stale").unwrap();
        exec.run(&copy_step("a.c", "a.c.o")).unwrap();
        exec.after().unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("a.c.o")).unwrap(), "stale");

        // Changing the input invalidates the fingerprint
        fs::write(temp.path().join("a.c"), "two").unwrap();
        exec.run(&copy_step("a.c", "a.c.o")).unwrap();
        exec.after().unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("a.c.o")).unwrap(), "two");
    }

    #[test]
    fn test_missing_output_forces_a_rerun() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.c"), "one").unwrap();

        let mut exec = ProcessExecutor::new(temp.path(), 1, false).unwrap();
        exec.run(&copy_step("a.c", "a.c.o")).unwrap();
        exec.after().unwrap();

        fs::remove_file(temp.path().join("a.c.o")).unwrap();
        exec.run(&copy_step("a.c", "a.c.o")).unwrap();
        exec.after().unwrap();
        assert!(temp.path().join("a.c.o").exists());
    }

    #[test]
    fn test_failing_step_surfaces_at_the_barrier() {
        let temp = TempDir::new().unwrap();
        let mut exec = ProcessExecutor::new(temp.path(), 1, false).unwrap();

        let step = BuildStep::new("m", None, StepKind::External, PathBuf::from("false"));
        exec.run(&step).unwrap();

        let err = exec.after().unwrap_err();
        assert!(matches!(err, BuildError::StepFailed { code: 1, .. }));
    }

    #[test]
    fn test_stdout_capture() {
        let temp = TempDir::new().unwrap();
        let mut exec = ProcessExecutor::new(temp.path(), 1, false).unwrap();

        let step = BuildStep::new("m", Some("DEBUG"), StepKind::Dump, PathBuf::from("echo"))
            .with_args(vec!["disassembly".to_string()])
            .with_output(PathBuf::from("fw.dump"))
            .with_stdout_to(PathBuf::from("fw.dump"));
        exec.run(&step).unwrap();
        exec.after().unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("fw.dump")).unwrap(),
            "disassembly\n"
        );
    }

    #[test]
    fn test_autoclean_removes_outputs_and_cache() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.c"), "one").unwrap();

        let mut exec = ProcessExecutor::new(temp.path(), 1, false).unwrap();
        exec.run(&copy_step("a.c", "a.c.o")).unwrap();
        exec.after().unwrap();
        assert!(temp.path().join(ProcessExecutor::CACHE_FILE).exists());

        exec.autoclean().unwrap();
        assert!(!temp.path().join("a.c.o").exists());
        assert!(!temp.path().join(ProcessExecutor::CACHE_FILE).exists());
        // Inputs are untouched
        assert!(temp.path().join("a.c").exists());
    }
}
