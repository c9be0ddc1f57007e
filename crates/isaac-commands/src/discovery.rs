//! Command discovery from the filesystem.
//!
//! Scans a directory for immediate subdirectories containing
//! `command.toml`. Broken manifests are collected as errors and never stop
//! the scan.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::descriptor::CommandDescriptor;
use crate::manifest::{parse_manifest_file, MANIFEST_FILENAME};

/// A manifest that could not be loaded, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Result of scanning one directory.
#[derive(Debug, Default)]
pub struct Discovery {
    pub descriptors: Vec<CommandDescriptor>,
    pub errors: Vec<LoadError>,
}

/// Discover commands in `commands_dir`, sorted by subdirectory name so
/// registration order is stable.
pub fn discover_commands(commands_dir: &Path) -> Discovery {
    let mut discovery = Discovery::default();

    if !commands_dir.is_dir() {
        discovery.errors.push(LoadError {
            path: commands_dir.to_path_buf(),
            message: "command directory does not exist or is not a directory".into(),
        });
        return discovery;
    }

    let entries = match std::fs::read_dir(commands_dir) {
        Ok(entries) => entries,
        Err(e) => {
            discovery.errors.push(LoadError {
                path: commands_dir.to_path_buf(),
                message: format!("failed to read command directory: {e}"),
            });
            return discovery;
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let manifest_path = dir.join(MANIFEST_FILENAME);

        if dir.is_symlink() {
            warn!(path = %dir.display(), "skipping symlinked command directory");
            discovery.errors.push(LoadError {
                path: dir,
                message: "symlinked command directories are not loaded".into(),
            });
            continue;
        }
        if !manifest_path.is_file() {
            debug!(path = %dir.display(), "no {MANIFEST_FILENAME}, skipping");
            continue;
        }

        let loaded = parse_manifest_file(&manifest_path)
            .and_then(|manifest| CommandDescriptor::new(manifest, &dir));
        match loaded {
            Ok(descriptor) => discovery.descriptors.push(descriptor),
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %format!("{e:#}"), "invalid command manifest");
                discovery.errors.push(LoadError {
                    path: manifest_path,
                    message: format!("{e:#}"),
                });
            }
        }
    }

    discovery
}
