/// Build system error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(#[from] forge_config::ConfigError),

    #[error("Unknown build type '{buildtype}' referenced by {referrer}")]
    UnknownBuildType { buildtype: String, referrer: String },

    #[error("Module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("Module '{module}' uses undeclared module '{uses}'")]
    UnknownUses { module: String, uses: String },

    #[error("No tool registered for extension '{ext}' (source {file})")]
    UnregisteredExtension { ext: String, file: PathBuf },

    #[error("Tool '{tool}' has no executable configured for architecture '{arch}'")]
    ToolNotConfigured { tool: String, arch: String },

    #[error("Source '{file}' cannot strip {strip} leading components")]
    BadStripDepth { file: PathBuf, strip: usize },

    #[error("App module '{module}' has no sources to link")]
    NoSources { module: String },

    #[error("Step '{step}' failed with exit code {code}:\n{stderr}")]
    StepFailed {
        step: String,
        code: i32,
        stderr: String,
    },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create an unknown-build-type error
    pub fn unknown_buildtype(buildtype: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self::UnknownBuildType {
            buildtype: buildtype.into(),
            referrer: referrer.into(),
        }
    }

    /// Create a module-not-found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            module: module.into(),
        }
    }

    /// Create an unknown-uses error
    pub fn unknown_uses(module: impl Into<String>, uses: impl Into<String>) -> Self {
        Self::UnknownUses {
            module: module.into(),
            uses: uses.into(),
        }
    }

    /// Create a tool-not-configured error
    pub fn tool_not_configured(tool: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::ToolNotConfigured {
            tool: tool.into(),
            arch: arch.into(),
        }
    }
}
