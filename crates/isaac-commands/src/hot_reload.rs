//! Polling watcher for command manifests.
//!
//! The interactive shell polls before each line and reloads the registry
//! when anything under the command directories changed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;

use crate::manifest::MANIFEST_FILENAME;

/// A change to one command directory's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestChange {
    Added(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Tracks manifest modification times across poll calls.
#[derive(Debug, Default)]
pub struct ManifestWatcher {
    watch_paths: Vec<PathBuf>,
    known: HashMap<PathBuf, SystemTime>,
}

impl ManifestWatcher {
    /// Watch `paths` and record the current state as the baseline.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut watcher = Self {
            watch_paths: paths.into_iter().collect(),
            known: HashMap::new(),
        };
        watcher.known = watcher.scan();
        watcher
    }

    /// Changes since the previous poll (or since construction).
    pub fn poll_changes(&mut self) -> Vec<ManifestChange> {
        let current = self.scan();
        let mut changes = Vec::new();

        for (path, mtime) in &current {
            match self.known.get(path) {
                None => changes.push(ManifestChange::Added(path.clone())),
                Some(old) if old != mtime => changes.push(ManifestChange::Modified(path.clone())),
                Some(_) => {}
            }
        }
        for path in self.known.keys() {
            if !current.contains_key(path) {
                changes.push(ManifestChange::Removed(path.clone()));
            }
        }

        if !changes.is_empty() {
            debug!(count = changes.len(), "command manifests changed");
        }
        self.known = current;
        changes
    }

    fn scan(&self) -> HashMap<PathBuf, SystemTime> {
        let mut found = HashMap::new();
        for root in &self.watch_paths {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let manifest = entry.path().join(MANIFEST_FILENAME);
                if let Ok(mtime) = std::fs::metadata(&manifest).and_then(|m| m.modified()) {
                    found.insert(manifest, mtime);
                }
            }
        }
        found
    }
}
