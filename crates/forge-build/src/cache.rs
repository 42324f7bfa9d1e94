//! Fingerprint cache backing the executor's incremental-skip decisions
//!
//! A step's fingerprint covers its full command line and the content of its
//! declared inputs. If the fingerprint matches the cached one and the output
//! still exists, the step does not need to run.

use crate::step::BuildStep;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk cache of step fingerprints, stored as JSON under `.forge/`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BuildCache {
    entries: HashMap<String, CacheEntry>,
}

/// One cached step result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint of the command line and input contents
    pub fingerprint: String,
    /// Output the step produced, if any (drives autoclean)
    pub output: Option<PathBuf>,
}

impl BuildCache {
    /// Load a cache file; a missing or unreadable cache means a full rebuild
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Persist the cache
    pub fn store(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Whether the cached fingerprint for `key` matches
    pub fn is_fresh(&self, key: &str, fingerprint: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.fingerprint == fingerprint)
    }

    /// Record a step result
    pub fn record(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// All outputs recorded in the cache
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.entries.values().filter_map(|e| e.output.as_deref())
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key for a step: the output path when there is one, the command
/// line otherwise
pub fn step_key(step: &BuildStep) -> String {
    match &step.output {
        Some(output) => output.display().to_string(),
        None => step.command_line(),
    }
}

/// Fingerprint a step: SHA-256 over the command line and the content of
/// every input, resolved against the project root. A missing input hashes
/// as a marker so its later appearance changes the fingerprint.
pub fn fingerprint_step(step: &BuildStep, project_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(step.command_line().as_bytes());

    for input in &step.inputs {
        let path = if input.is_absolute() {
            input.clone()
        } else {
            project_root.join(input)
        };
        hasher.update(input.display().to_string().as_bytes());
        match fs::read(&path) {
            Ok(content) => hasher.update(&content),
            Err(_) => hasher.update(b"<missing>"),
        }
    }

    format!("{:x}", hasher.finalize())
}
