/// Build step types: one concrete toolchain invocation each
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of build step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// Compile a C/C++ source to an object file
    Compile,
    /// Assemble a source to an object file
    Assemble,
    /// Link objects into the final artifact
    Link,
    /// Object-copy to Intel hex
    Hex,
    /// Object-copy to raw binary
    Bin,
    /// Disassembly dump of the linked artifact
    Dump,
    /// UF2 conversion of the raw binary
    Uf2,
    /// External/preliminary command
    External,
    /// Documentation generation
    Doc,
}

impl StepKind {
    /// Get the step kind name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Assemble => "assemble",
            Self::Link => "link",
            Self::Hex => "hex",
            Self::Bin => "bin",
            Self::Dump => "dump",
            Self::Uf2 => "uf2",
            Self::External => "external",
            Self::Doc => "doc",
        }
    }

    /// Whether this step produces an object file consumed by a link step
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Compile | Self::Assemble)
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One concrete toolchain invocation.
///
/// Produced by the module expander and never mutated afterwards; the
/// executor decides whether it actually needs to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Owning module (or external/docs entry) name
    pub module: String,
    /// Build variant, `None` for phase steps outside the source phase
    pub buildtype: Option<String>,
    /// Step kind
    pub kind: StepKind,
    /// Resolved executable
    pub executable: PathBuf,
    /// Final argument list
    pub args: Vec<String>,
    /// Input files the step reads (drives incremental-skip decisions)
    pub inputs: Vec<PathBuf>,
    /// Output file the step produces, if any
    pub output: Option<PathBuf>,
    /// Capture the tool's stdout into this file (disassembly dumps)
    pub stdout_to: Option<PathBuf>,
    /// Working directory override (external builds)
    pub cwd: Option<PathBuf>,
}

impl BuildStep {
    /// Create a step with the common fields; the rest default to empty
    pub fn new(
        module: impl Into<String>,
        buildtype: Option<&str>,
        kind: StepKind,
        executable: PathBuf,
    ) -> Self {
        Self {
            module: module.into(),
            buildtype: buildtype.map(|b| b.to_string()),
            kind,
            executable,
            args: Vec::new(),
            inputs: Vec::new(),
            output: None,
            stdout_to: None,
            cwd: None,
        }
    }

    /// Set the argument list
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the input files
    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set the output file
    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = Some(output);
        self
    }

    /// Capture stdout into a file
    pub fn with_stdout_to(mut self, path: PathBuf) -> Self {
        self.stdout_to = Some(path);
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    /// Render the full command line for logging and fingerprints
    pub fn command_line(&self) -> String {
        let mut line = self.executable.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Short human-readable label: kind, module, variant
    pub fn describe(&self) -> String {
        match &self.buildtype {
            Some(bt) => format!("{} {} [{}]", self.kind, self.module, bt),
            None => format!("{} {}", self.kind, self.module),
        }
    }
}
