//! In-memory command registry with atomic reload.
//!
//! [`CommandRegistry`] owns an `Arc<CommandTable>`. A reload builds a fresh
//! table from disk and swaps the pointer, so a dispatch holding a snapshot
//! keeps seeing the table it started with.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use isaac_types::Tier;
use regex::Regex;
use tracing::{info, warn};

use crate::descriptor::CommandDescriptor;
use crate::discovery::{discover_commands, LoadError};

/// Outcome of a registry load.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub count: usize,
    pub errors: Vec<LoadError>,
}

/// Immutable lookup table built from a set of descriptors.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<Arc<CommandDescriptor>>,
    by_name: HashMap<String, usize>,
    pub(crate) aliases: HashMap<String, usize>,
    /// Literal triggers in registration order.
    pub(crate) prefixes: Vec<(String, usize)>,
    /// Regex triggers in registration order.
    pub(crate) patterns: Vec<(Regex, usize)>,
}

impl CommandTable {
    /// Build a table, skipping any descriptor whose name, trigger, alias, or
    /// pattern is already taken by an earlier one.
    pub fn build(
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
    ) -> (Self, Vec<LoadError>) {
        let mut table = CommandTable::default();
        let mut errors = Vec::new();
        let mut words: HashMap<String, String> = HashMap::new();
        let mut pattern_owners: HashMap<String, String> = HashMap::new();

        for descriptor in descriptors {
            if let Err(message) = table.check_conflicts(&descriptor, &words, &pattern_owners) {
                warn!(command = descriptor.name(), %message, "skipping conflicting command");
                errors.push(LoadError {
                    path: descriptor.dir().to_path_buf(),
                    message,
                });
                continue;
            }

            let index = table.commands.len();
            let manifest = descriptor.manifest();
            for trigger in &manifest.triggers {
                words.insert(trigger.clone(), manifest.name.clone());
                table.prefixes.push((trigger.clone(), index));
            }
            for alias in &manifest.aliases {
                words.insert(alias.clone(), manifest.name.clone());
                table.aliases.insert(alias.clone(), index);
            }
            for re in descriptor.trigger_patterns() {
                pattern_owners.insert(re.as_str().to_string(), manifest.name.clone());
                table.patterns.push((re.clone(), index));
            }
            table.by_name.insert(manifest.name.clone(), index);
            table.commands.push(Arc::new(descriptor));
        }

        (table, errors)
    }

    fn check_conflicts(
        &self,
        descriptor: &CommandDescriptor,
        words: &HashMap<String, String>,
        patterns: &HashMap<String, String>,
    ) -> Result<(), String> {
        let name = descriptor.name();
        if self.by_name.contains_key(name) {
            return Err(format!("command '{name}' is already registered"));
        }
        let manifest = descriptor.manifest();
        let mut own = std::collections::HashSet::new();
        for word in manifest.triggers.iter().chain(&manifest.aliases) {
            if let Some(owner) = words.get(word) {
                return Err(format!("trigger '{word}' is already registered by '{owner}'"));
            }
            if !own.insert(word.as_str()) {
                return Err(format!("trigger '{word}' is declared twice"));
            }
        }
        for re in descriptor.trigger_patterns() {
            if let Some(owner) = patterns.get(re.as_str()) {
                return Err(format!(
                    "pattern '{}' is already registered by '{owner}'",
                    re.as_str()
                ));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.commands[i]))
    }

    pub(crate) fn at(&self, index: usize) -> &Arc<CommandDescriptor> {
        &self.commands[index]
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All commands, sorted by name.
    pub fn list(&self) -> Vec<Arc<CommandDescriptor>> {
        let mut all = self.commands.clone();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|d| d.name())
    }
}

/// Shared registry handle.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    table: RwLock<Arc<CommandTable>>,
    tier_overrides: BTreeMap<String, Tier>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply per-command tier overrides on every load.
    #[must_use]
    pub fn with_tier_overrides(mut self, overrides: BTreeMap<String, Tier>) -> Self {
        self.tier_overrides = overrides;
        self
    }

    /// Scan `paths`, build a new table, and swap it in.
    ///
    /// Paths are scanned in order; on conflicts the earlier path wins.
    pub fn load(&self, paths: &[PathBuf]) -> LoadReport {
        let mut errors = Vec::new();
        let mut descriptors = Vec::new();
        for path in paths {
            let discovery = discover_commands(path);
            errors.extend(discovery.errors);
            descriptors.extend(discovery.descriptors.into_iter().map(|d| {
                match self.tier_overrides.get(d.name()) {
                    Some(&tier) => d.with_tier(tier),
                    None => d,
                }
            }));
        }

        let (table, conflicts) = CommandTable::build(descriptors);
        errors.extend(conflicts);
        let count = table.len();
        self.replace(table);

        info!(count, errors = errors.len(), "command registry loaded");
        LoadReport { count, errors }
    }

    /// Swap in a prebuilt table.
    pub fn replace(&self, table: CommandTable) {
        let table = Arc::new(table);
        match self.table.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }

    /// The current table. Holders keep it alive across a concurrent reload.
    pub fn snapshot(&self) -> Arc<CommandTable> {
        match self.table.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{parse_manifest, MANIFEST_FILENAME};
    use std::path::Path;
    use tempfile::TempDir;

    fn descriptor(name: &str, triggers: &[&str], aliases: &[&str]) -> CommandDescriptor {
        let triggers: Vec<String> = triggers.iter().map(|t| format!("\"{t}\"")).collect();
        let aliases: Vec<String> = aliases.iter().map(|a| format!("\"{a}\"")).collect();
        let manifest = parse_manifest(&format!(
            r#"
            name = "{name}"
            version = "1.0.0"
            triggers = [{}]
            aliases = [{}]
            tier = 1
            [runtime]
            entry = "run.sh"
            "#,
            triggers.join(", "),
            aliases.join(", ")
        ))
        .unwrap();
        CommandDescriptor::new(manifest, format!("/cmds/{name}")).unwrap()
    }

    fn write_command(root: &Path, name: &str, tier: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILENAME),
            format!(
                "name = \"{name}\"\nversion = \"1.0.0\"\ntriggers = [\"{name}\"]\ntier = {tier}\n[runtime]\nentry = \"run.sh\"\n"
            ),
        )
        .unwrap();
    }

    #[test]
    fn build_rejects_duplicate_trigger() {
        let (table, errors) = CommandTable::build(vec![
            descriptor("status", &["status"], &[]),
            descriptor("stats", &["status"], &[]),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("already registered by 'status'"));
    }

    #[test]
    fn build_rejects_alias_colliding_with_trigger() {
        let (table, errors) = CommandTable::build(vec![
            descriptor("list", &["ls"], &[]),
            descriptor("dir", &["dir"], &["ls"]),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn build_rejects_duplicate_name() {
        let (table, errors) = CommandTable::build(vec![
            descriptor("status", &["status"], &[]),
            descriptor("status", &["st"], &[]),
        ]);
        assert_eq!(table.len(), 1);
        assert!(errors[0].message.contains("already registered"));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let (table, _) = CommandTable::build(vec![
            descriptor("zeta", &["zeta"], &[]),
            descriptor("alpha", &["alpha"], &[]),
        ]);
        let names: Vec<String> = table.list().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(table.get("alpha").is_some());
        assert!(table.get("beta").is_none());
    }

    #[test]
    fn load_counts_and_collects_errors() {
        let tmp = TempDir::new().unwrap();
        write_command(tmp.path(), "status", "1");
        write_command(tmp.path(), "delete", "4");
        let broken = tmp.path().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join(MANIFEST_FILENAME), "garbage = ").unwrap();

        let registry = CommandRegistry::new();
        let report = registry.load(&[tmp.path().to_path_buf()]);
        assert_eq!(report.count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn reload_swaps_table_without_disturbing_snapshots() {
        let tmp = TempDir::new().unwrap();
        write_command(tmp.path(), "status", "1");
        let registry = CommandRegistry::new();
        registry.load(&[tmp.path().to_path_buf()]);

        let before = registry.snapshot();
        write_command(tmp.path(), "deploy", "3");
        let report = registry.load(&[tmp.path().to_path_buf()]);

        assert_eq!(report.count, 2);
        assert_eq!(before.len(), 1, "old snapshot must stay intact");
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn tier_overrides_apply_on_load() {
        let tmp = TempDir::new().unwrap();
        write_command(tmp.path(), "deploy", "2");
        let registry = CommandRegistry::new()
            .with_tier_overrides(BTreeMap::from([("deploy".to_string(), Tier::Lockdown)]));
        registry.load(&[tmp.path().to_path_buf()]);
        let deploy = registry.snapshot().get("deploy").unwrap();
        assert_eq!(deploy.tier(), Tier::Lockdown);
    }

    #[test]
    fn earlier_path_wins_on_conflict() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_command(first.path(), "status", "1");
        write_command(second.path(), "status", "4");

        let registry = CommandRegistry::new();
        let report = registry.load(&[first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(report.count, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(registry.snapshot().get("status").unwrap().tier(), Tier::Instant);
    }
}
