//! Registered command descriptors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use isaac_types::Tier;
use regex::Regex;

use crate::manifest::{validate_manifest, ArgSpec, CommandManifest};

/// A validated manifest plus its compiled patterns and home directory.
///
/// Descriptors are immutable once built; a reload builds new ones.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    manifest: CommandManifest,
    dir: PathBuf,
    tier: Tier,
    trigger_patterns: Vec<Regex>,
    arg_patterns: HashMap<String, Regex>,
}

impl CommandDescriptor {
    /// Validate `manifest` and compile its regexes.
    pub fn new(manifest: CommandManifest, dir: impl Into<PathBuf>) -> Result<Self> {
        validate_manifest(&manifest)?;

        let trigger_patterns = manifest
            .patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid trigger pattern '{p}'")))
            .collect::<Result<Vec<_>>>()?;

        let mut arg_patterns = HashMap::new();
        for arg in &manifest.args {
            if let Some(pattern) = &arg.pattern {
                // Anchored so the whole value has to match.
                let anchored = format!("^(?:{pattern})$");
                let re = Regex::new(&anchored).with_context(|| {
                    format!("invalid pattern for argument '{}': {pattern}", arg.name)
                })?;
                arg_patterns.insert(arg.name.clone(), re);
            }
        }

        Ok(Self {
            tier: manifest.tier,
            manifest,
            dir: dir.into(),
            trigger_patterns,
            arg_patterns,
        })
    }

    /// Replace the declared tier, e.g. from a config override.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Effective tier after overrides.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn accepts_stdin(&self) -> bool {
        self.manifest.stdin
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.manifest.args
    }

    pub fn trigger_patterns(&self) -> &[Regex] {
        &self.trigger_patterns
    }

    pub fn arg_pattern(&self, name: &str) -> Option<&Regex> {
        self.arg_patterns.get(name)
    }

    pub fn entry_path(&self) -> PathBuf {
        self.dir.join(&self.manifest.runtime.entry)
    }

    pub fn timeout(&self, default: Duration) -> Duration {
        self.manifest
            .resources
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    pub fn max_output_bytes(&self, default_kib: u64) -> usize {
        let kib = self.manifest.resources.max_output_kib.unwrap_or(default_kib);
        usize::try_from(kib.saturating_mul(1024)).unwrap_or(usize::MAX)
    }

    pub fn capabilities(&self) -> &[String] {
        &self.manifest.capabilities
    }
}
