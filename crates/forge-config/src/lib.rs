//! Forge configuration system
//!
//! Loads and validates the declarative build manifest (`forge.toml`) that
//! drives the forge cross-compilation frontend:
//! - Build type registry (variant name → output root)
//! - Toolchain tables (per-architecture executables and search paths)
//! - Layered option sets with per-build-type overlays
//! - Module/library declarations with inter-module `uses` references
//!
//! The manifest is parsed once, validated as a whole, and then treated as
//! immutable by everything downstream.

pub mod loader;
pub mod manifest;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No forge.toml found in {0} or any parent directory")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Build types '{first}' and '{second}' share output directory {dir}")]
    DuplicateOutputDir {
        first: String,
        second: String,
        dir: PathBuf,
    },

    #[error("Extension '{ext}' is claimed by both '{first}' and '{second}'")]
    DuplicateExtension {
        ext: String,
        first: String,
        second: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{LoadedManifest, ManifestLoader};
pub use manifest::{
    AppConfig, ArchOptions, DirSpec, ExternalConfig, Manifest, ModuleConfig, OptionGroup,
    SourceSpec, ToolsConfig,
};
