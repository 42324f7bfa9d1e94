//! Build Manifest (forge.toml)
//!
//! Declarative description of everything the frontend resolves: build types,
//! toolchains, option layers, and the module/library tables. Deserialized
//! into a typed tree and validated up front; downstream code never mutates it.
//!
//! Build-type overlays are explicit sub-tables (`cflags-for.DEBUG = [...]`)
//! rather than suffixed string keys, so a typo in a variant name is a
//! validation error instead of a silently unused entry.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Top-level manifest
///
/// Maps are `BTreeMap`s throughout: resolution walks these tables to decide
/// step issue order, and that order must be stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Build type registry: variant name → output base directory
    #[serde(default)]
    pub builds: BTreeMap<String, PathBuf>,

    /// Extension registry: tool id → source extensions it compiles
    #[serde(default)]
    pub extensions: BTreeMap<String, Vec<String>>,

    /// Toolchain resolution tables
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Layered option groups, keyed by tool id or a `TOOL:TOOL` shared key
    #[serde(default)]
    pub options: BTreeMap<String, OptionGroup>,

    /// Module names excluded from every phase (declarations stay intact)
    #[serde(default)]
    pub skip: BTreeSet<String>,

    /// External/preliminary builds, completed before any source build
    #[serde(default)]
    pub external: BTreeMap<String, ExternalConfig>,

    /// Source modules and libraries
    #[serde(default)]
    pub source: BTreeMap<String, ModuleConfig>,

    /// Documentation inputs, passed through to the docs phase unexamined
    #[serde(default)]
    pub docs: Vec<PathBuf>,
}

/// Toolchain tables: where executables live and what they are called
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Directory prefix per architecture or per tool category.
    /// A tool with no matching entry resolves via the ambient search path.
    #[serde(default)]
    pub path: BTreeMap<String, PathBuf>,

    /// Executable name per tool id, per architecture
    #[serde(default)]
    pub bin: BTreeMap<String, BTreeMap<String, String>>,
}

/// One option group (`[options.GCC]`, `[options."GCC:GXX"]`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OptionGroup {
    /// Warning flags, merged ahead of everything else
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warn: Vec<String>,

    /// Preprocessor defines contributed by the group itself
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,

    /// Per-architecture flag sets
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub arch: BTreeMap<String, ArchOptions>,
}

/// Architecture-level flags inside an option group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ArchOptions {
    /// Base compile flags for this architecture
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cflags: Vec<String>,

    /// Base link flags (handed to the linker via the compiler driver)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ldflags: Vec<String>,

    /// Compile-flag overlay per build type, appended after the base list
    #[serde(default, rename = "cflags-for")]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cflags_for: BTreeMap<String, Vec<String>>,

    /// Link-flag overlay per build type
    #[serde(default, rename = "ldflags-for")]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ldflags_for: BTreeMap<String, Vec<String>>,
}

/// An external/preliminary build: raw commands run before the source phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ExternalConfig {
    /// Displayed version of the external package
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Directory the commands run in (default: project root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basedir: Option<PathBuf>,

    /// Commands to run, each an argv list
    #[serde(default)]
    pub make: Vec<Vec<String>>,

    /// Sequencing hint among externals
    #[serde(default)]
    pub order: i64,
}

/// A module or library declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Architecture the module is built with (must match the tool tables)
    pub arch: String,

    /// Displayed version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Target core/device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<String>,

    /// Directory the sources are found under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<PathBuf>,

    /// Source checkout directory when it differs from the prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basedir: Option<PathBuf>,

    /// Package as a reusable library under this name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Marks the final linkable artifact and its packaging outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppConfig>,

    /// Assembler listing request, passed through on assembly steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<String>,

    /// Preprocessor defines for every build of this module
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,

    /// Extra defines per build type
    #[serde(default, rename = "defines-for")]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub defines_for: BTreeMap<String, Vec<String>>,

    /// Module-specific link flags (passed to the linker via the driver)
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ldflags: Vec<String>,

    /// Explicit source files
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub src: Vec<SourceSpec>,

    /// Source discovery: directories scanned for files by extension
    #[serde(default, rename = "src-dirs")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub src_dirs: Vec<DirSpec>,

    /// Include directories specific to this module
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,

    /// Include discovery: directories containing headers of an extension
    #[serde(default, rename = "include-dirs")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_dirs: Vec<DirSpec>,

    /// System include directories
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sysinclude: Vec<PathBuf>,

    /// Modules/libraries whose includes and defines this module consumes
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,

    /// Sequencing hint among modules of the same phase
    #[serde(default)]
    pub order: i64,
}

/// Packaging outputs of an app module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Linked artifact name (the `.elf`)
    pub name: String,

    /// Link map file name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,

    /// Disassembly dump file name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<String>,

    /// Intel-hex artifact name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,

    /// Raw binary artifact name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,

    /// UF2 artifact name (converted from the raw binary)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uf2: Option<String>,

    /// Object-copy flags for the hex artifact
    #[serde(default, rename = "hex-flags")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hex_flags: Vec<String>,

    /// Object-copy flags for the binary artifact
    #[serde(default, rename = "bin-flags")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bin_flags: Vec<String>,

    /// Converter flags for the UF2 artifact
    #[serde(default, rename = "uf2-flags")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uf2_flags: Vec<String>,

    /// Disassembler flags for the dump artifact
    #[serde(default, rename = "dump-flags")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dump_flags: Vec<String>,
}

/// One source entry: a bare path, or an explicit (file, dest, strip) form.
///
/// A bare path is exactly equivalent to `{ file = <path>, strip = 0 }` with
/// no destination override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourceSpec {
    Path(PathBuf),
    Detailed {
        file: PathBuf,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        dest: Option<PathBuf>,
        #[serde(default)]
        strip: usize,
    },
}

impl SourceSpec {
    /// Source file path
    pub fn file(&self) -> &Path {
        match self {
            Self::Path(p) => p,
            Self::Detailed { file, .. } => file,
        }
    }

    /// Destination subdirectory override, if any
    pub fn dest(&self) -> Option<&Path> {
        match self {
            Self::Path(_) => None,
            Self::Detailed { dest, .. } => dest.as_deref(),
        }
    }

    /// Leading path components removed when mapping source to destination
    pub fn strip(&self) -> usize {
        match self {
            Self::Path(_) => 0,
            Self::Detailed { strip, .. } => *strip,
        }
    }
}

/// A directory scan request used by source/include discovery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DirSpec {
    /// Directory to scan
    pub dir: PathBuf,

    /// File extension to match, including the leading dot
    pub ext: String,

    /// Scan subdirectories too
    #[serde(default = "default_true")]
    pub recursive: bool,
}

fn default_true() -> bool {
    true
}

impl Manifest {
    /// Load a manifest from a file, validating it structurally
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let manifest: Self =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error: e,
            })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Structural validation: everything checkable without cross-referencing
    /// the toolchain tables (the build crate validates those during
    /// resolution, before any step is issued).
    pub fn validate(&self) -> ConfigResult<()> {
        // Output directories must be unique across build types
        let mut seen_dirs: BTreeMap<&Path, &str> = BTreeMap::new();
        for (name, dir) in &self.builds {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "builds".to_string(),
                    reason: "build type name cannot be empty".to_string(),
                });
            }
            if let Some(first) = seen_dirs.insert(dir.as_path(), name.as_str()) {
                return Err(ConfigError::DuplicateOutputDir {
                    first: first.to_string(),
                    second: name.clone(),
                    dir: dir.clone(),
                });
            }
        }

        // No extension may be claimed by two tools
        let mut seen_exts: BTreeMap<&str, &str> = BTreeMap::new();
        for (tool, exts) in &self.extensions {
            for ext in exts {
                if !ext.starts_with('.') {
                    return Err(ConfigError::InvalidValue {
                        field: format!("extensions.{tool}"),
                        reason: format!("extension '{ext}' must start with '.'"),
                    });
                }
                if let Some(first) = seen_exts.insert(ext.as_str(), tool.as_str()) {
                    return Err(ConfigError::DuplicateExtension {
                        ext: ext.clone(),
                        first: first.to_string(),
                        second: tool.clone(),
                    });
                }
            }
        }

        for (name, module) in &self.source {
            module.validate(name)?;
        }

        for (name, external) in &self.external {
            for (i, cmd) in external.make.iter().enumerate() {
                if cmd.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("external.{name}.make[{i}]"),
                        reason: "command cannot be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Look up a build type's output root
    pub fn buildtype_root(&self, buildtype: &str) -> Option<&Path> {
        self.builds.get(buildtype).map(|p| p.as_path())
    }

    /// Look up a source module by name
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.source.get(name)
    }

    /// Whether a module name is excluded from expansion
    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.contains(name)
    }
}

impl ModuleConfig {
    fn validate(&self, name: &str) -> ConfigResult<()> {
        if self.arch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("source.{name}.arch"),
                reason: "architecture cannot be empty".to_string(),
            });
        }

        for spec in &self.src {
            let components = spec.file().components().count();
            if components == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("source.{name}.src"),
                    reason: "source path cannot be empty".to_string(),
                });
            }
            // Stripping must leave at least the file name
            if spec.strip() >= components {
                return Err(ConfigError::InvalidValue {
                    field: format!("source.{name}.src"),
                    reason: format!(
                        "strip depth {} consumes all {} components of '{}'",
                        spec.strip(),
                        components,
                        spec.file().display()
                    ),
                });
            }
        }

        if let Some(app) = &self.app {
            if app.name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("source.{name}.app.name"),
                    reason: "app artifact name cannot be empty".to_string(),
                });
            }
            if app.uf2.is_some() && app.bin.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("source.{name}.app.uf2"),
                    reason: "uf2 conversion reads the raw binary; declare 'bin' too".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Directory the module's sources live under
    pub fn source_root(&self) -> Option<&Path> {
        self.basedir.as_deref().or(self.prefix.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_manifest() -> &'static str {
        r#"
[builds]
DEBUG = "build/debug"
"OPT-SIZE" = "build/optimized/size"

[extensions]
GCC = [".c"]
GAS = [".S"]

[tools.path]
ARM = "/opt/arm/bin"

[tools.bin.GCC]
ARM = "arm-none-eabi-gcc"

[source.firmware]
arch = "ARM"
src = ["main.c"]
"#
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest: Manifest = toml::from_str(minimal_manifest()).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.builds.len(), 2);
        assert_eq!(
            manifest.buildtype_root("DEBUG"),
            Some(Path::new("build/debug"))
        );
        assert!(manifest.module("firmware").is_some());
        assert!(!manifest.is_skipped("firmware"));
    }

    #[test]
    fn test_bare_and_detailed_source_specs() {
        let toml = r#"
[source.m]
arch = "ARM"
src = ["a.c", { file = "hal/startup.S", dest = "obj", strip = 1 }]
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        let module = manifest.module("m").unwrap();

        assert_eq!(module.src[0], SourceSpec::Path(PathBuf::from("a.c")));
        assert_eq!(module.src[0].strip(), 0);
        assert_eq!(module.src[0].dest(), None);

        assert_eq!(module.src[1].file(), Path::new("hal/startup.S"));
        assert_eq!(module.src[1].dest(), Some(Path::new("obj")));
        assert_eq!(module.src[1].strip(), 1);
    }

    #[test]
    fn test_option_overlays_are_typed_tables() {
        let toml = r#"
[options."GCC:GXX"]
warn = ["-Wall"]

[options."GCC:GXX".arch.ARM]
cflags = ["-mthumb"]

[options."GCC:GXX".arch.ARM.cflags-for]
DEBUG = ["-Og", "-ggdb3"]
"OPT-SIZE" = ["-Os"]
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        let group = &manifest.options["GCC:GXX"];
        let arm = &group.arch["ARM"];

        assert_eq!(group.warn, vec!["-Wall"]);
        assert_eq!(arm.cflags, vec!["-mthumb"]);
        assert_eq!(arm.cflags_for["DEBUG"], vec!["-Og", "-ggdb3"]);
        assert_eq!(arm.cflags_for["OPT-SIZE"], vec!["-Os"]);
    }

    #[test]
    fn test_duplicate_output_dir_rejected() {
        let toml = r#"
[builds]
DEBUG = "build/out"
RELEASE = "build/out"
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOutputDir { .. }));
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let toml = r#"
[extensions]
GCC = [".c"]
GXX = [".c"]
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateExtension { .. }));
    }

    #[test]
    fn test_strip_depth_must_leave_file_name() {
        let toml = r#"
[source.m]
arch = "ARM"
src = [{ file = "hal/boot.S", strip = 2 }]
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_uf2_requires_bin() {
        let toml = r#"
[source.m]
arch = "ARM"
src = ["main.c"]

[source.m.app]
name = "m.elf"
uf2 = "m.uf2"
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_app_module_round_trip() {
        let toml = r#"
[source.oven]
arch = "ARM"
core = "SAMD21J18A"
defines = ["__SAMD21J18A__"]
src = ["main.c"]
uses = ["hal"]
order = 1

[source.oven.defines-for]
DEBUG = ["DEBUG"]

[source.oven.app]
name = "oven.elf"
map = "oven.map"
hex = "oven.hex"
bin = "oven.bin"
uf2 = "oven.uf2"
hex-flags = ["-j", ".text", "-j", ".data", "-O", "ihex"]
bin-flags = ["-j", ".text", "-j", ".data", "-O", "binary"]
uf2-flags = ["-b", "0x2000", "-c"]
"#;
        let manifest: Manifest = toml::from_str(toml).unwrap();
        assert!(manifest.validate().is_ok());

        let module = manifest.module("oven").unwrap();
        assert_eq!(module.defines_for["DEBUG"], vec!["DEBUG"]);
        assert_eq!(module.uses, vec!["hal"]);

        let app = module.app.as_ref().unwrap();
        assert_eq!(app.name, "oven.elf");
        assert_eq!(app.hex.as_deref(), Some("oven.hex"));
        assert_eq!(app.uf2_flags, vec!["-b", "0x2000", "-c"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[source.m]
arch = "ARM"
sources = ["main.c"]
"#;
        assert!(toml::from_str::<Manifest>(toml).is_err());
    }
}
