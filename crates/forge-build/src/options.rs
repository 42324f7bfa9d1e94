//! Option merging across tool, architecture, and build-type layers
//!
//! Flag order is significant: warning lists come first, then the
//! architecture base flags, then the build-type overlay, so a variant's
//! `-Os`/`-Og` lands after any default optimization level and wins at the
//! compiler.

use forge_config::OptionGroup;
use std::collections::BTreeMap;

/// Result of an option merge for one (tool, arch, build type) triple
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedOptions {
    /// Compile flags (warnings, architecture base, build-type overlay)
    pub flags: Vec<String>,
    /// Link flags, handed to the linker through the compiler driver
    pub ldflags: Vec<String>,
    /// Preprocessor defines contributed by the matched groups
    pub defines: Vec<String>,
}

/// Merges layered option groups into final flag lists.
///
/// A group keyed `"GCC:GXX"` applies to both tools and contributes before
/// the tool's own group; a tool/architecture combination with no entry
/// yields empty lists rather than an error.
pub struct OptionMerger<'a> {
    groups: &'a BTreeMap<String, OptionGroup>,
}

impl<'a> OptionMerger<'a> {
    /// Create a merger over a manifest's option table
    pub fn new(groups: &'a BTreeMap<String, OptionGroup>) -> Self {
        Self { groups }
    }

    /// Merge options for one tool, architecture, and optional build type.
    ///
    /// Deterministic and order-stable: groups are walked in manifest key
    /// order, shared groups ahead of the tool's own group, and each pass
    /// (warn, base, overlay) completes before the next begins.
    pub fn merge(&self, tool: &str, arch: &str, buildtype: Option<&str>) -> MergedOptions {
        let groups = self.matching_groups(tool);
        let mut merged = MergedOptions::default();

        for group in &groups {
            merged.flags.extend(group.warn.iter().cloned());
        }

        for group in &groups {
            if let Some(opts) = group.arch.get(arch) {
                merged.flags.extend(opts.cflags.iter().cloned());
            }
        }

        if let Some(bt) = buildtype {
            for group in &groups {
                if let Some(overlay) = group.arch.get(arch).and_then(|o| o.cflags_for.get(bt)) {
                    merged.flags.extend(overlay.iter().cloned());
                }
            }
        }

        for group in &groups {
            if let Some(opts) = group.arch.get(arch) {
                merged.ldflags.extend(opts.ldflags.iter().cloned());
            }
        }

        if let Some(bt) = buildtype {
            for group in &groups {
                if let Some(overlay) = group.arch.get(arch).and_then(|o| o.ldflags_for.get(bt)) {
                    merged.ldflags.extend(overlay.iter().cloned());
                }
            }
        }

        for group in &groups {
            merged.defines.extend(group.defines.iter().cloned());
        }

        merged
    }

    /// Groups that apply to a tool: shared `A:B` keys first, then the
    /// tool's own key, each class in manifest order
    fn matching_groups(&self, tool: &str) -> Vec<&'a OptionGroup> {
        let mut shared = Vec::new();
        let mut own = Vec::new();

        for (key, group) in self.groups {
            let mut tools = key.split(':');
            if key.contains(':') {
                if tools.any(|t| t == tool) {
                    shared.push(group);
                }
            } else if key == tool {
                own.push(group);
            }
        }

        shared.extend(own);
        shared
    }
}
