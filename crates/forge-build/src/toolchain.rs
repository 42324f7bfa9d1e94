/// Toolchain resolution: (tool id, architecture) → executable path
use crate::error::{BuildError, BuildResult};
use forge_config::ToolsConfig;
use std::path::PathBuf;

/// Well-known tool ids the expander asks for beyond the extension table
pub mod tool {
    /// Compiler driver, also drives the link when no LD binding exists
    pub const CC: &str = "GCC";
    /// Dedicated link driver, honored when bound for the architecture
    pub const LD: &str = "LD";
    /// Object-copy (hex/bin artifacts)
    pub const OBJCOPY: &str = "OBJ-COPY";
    /// Disassembler (dump artifact)
    pub const OBJDUMP: &str = "OBJ-DUMP";
    /// UF2 converter
    pub const UF2: &str = "UF2CONV";
    /// Documentation generator, keyed under the `GEN` pseudo-architecture
    pub const DOC: &str = "DOC";
    /// Pseudo-architecture for tools that do not belong to a toolchain
    pub const GEN: &str = "GEN";
}

/// Resolves tool invocations by composing the path and bin tables.
///
/// The executable name comes from `tools.bin[tool][arch]`; the directory
/// prefix from `tools.path[tool]` (category entry) or `tools.path[arch]`.
/// No path entry means the bare executable name is used and resolution is
/// left to the ambient search path.
pub struct ToolchainResolver<'a> {
    tools: &'a ToolsConfig,
}

impl<'a> ToolchainResolver<'a> {
    /// Create a resolver over a manifest's tool tables
    pub fn new(tools: &'a ToolsConfig) -> Self {
        Self { tools }
    }

    /// Whether the (tool, arch) pair has an executable bound
    pub fn is_configured(&self, tool: &str, arch: &str) -> bool {
        self.tools
            .bin
            .get(tool)
            .is_some_and(|archs| archs.contains_key(arch))
    }

    /// Resolve a (tool, arch) pair to an executable path.
    ///
    /// Missing executable binding is a hard error; a missing path entry is
    /// not.
    pub fn resolve(&self, tool: &str, arch: &str) -> BuildResult<PathBuf> {
        let exe = self
            .tools
            .bin
            .get(tool)
            .and_then(|archs| archs.get(arch))
            .ok_or_else(|| BuildError::tool_not_configured(tool, arch))?;

        let dir = self
            .tools
            .path
            .get(tool)
            .or_else(|| self.tools.path.get(arch));

        Ok(match dir {
            Some(dir) => dir.join(exe),
            None => PathBuf::from(exe),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_config::Manifest;

    fn tools() -> ToolsConfig {
        let manifest: Manifest = toml::from_str(
            r#"
[tools.path]
ARM = "/opt/arm/bin"
UF2CONV = "scripts"

[tools.bin.GCC]
ARM = "arm-none-eabi-gcc"

[tools.bin.OBJ-COPY]
ARM = "arm-none-eabi-objcopy"

[tools.bin.UF2CONV]
ARM = "uf2conv.py"

[tools.bin.HOSTCC]
X86 = "cc"
"#,
        )
        .unwrap();
        manifest.tools
    }

    #[test]
    fn test_resolve_with_arch_path() {
        let tools = tools();
        let resolver = ToolchainResolver::new(&tools);

        assert_eq!(
            resolver.resolve("GCC", "ARM").unwrap(),
            PathBuf::from("/opt/arm/bin/arm-none-eabi-gcc")
        );
    }

    #[test]
    fn test_per_tool_path_wins_over_arch_path() {
        let tools = tools();
        let resolver = ToolchainResolver::new(&tools);

        assert_eq!(
            resolver.resolve("UF2CONV", "ARM").unwrap(),
            PathBuf::from("scripts/uf2conv.py")
        );
    }

    #[test]
    fn test_no_path_entry_falls_back_to_bare_name() {
        let tools = tools();
        let resolver = ToolchainResolver::new(&tools);

        assert_eq!(resolver.resolve("HOSTCC", "X86").unwrap(), PathBuf::from("cc"));
    }

    #[test]
    fn test_missing_arch_binding_is_a_hard_error() {
        let tools = tools();
        let resolver = ToolchainResolver::new(&tools);

        assert!(resolver.is_configured("GCC", "ARM"));
        assert!(!resolver.is_configured("GCC", "AVR"));

        let err = resolver.resolve("GCC", "AVR").unwrap_err();
        match err {
            BuildError::ToolNotConfigured { tool, arch } => {
                assert_eq!(tool, "GCC");
                assert_eq!(arch, "AVR");
            }
            other => panic!("expected ToolNotConfigured, got {other:?}"),
        }
    }
}
