//! `isaac commands`: inspect command manifests.

use std::path::Path;

use anyhow::{bail, Result};

use isaac_commands::{discover_commands, CommandDescriptor, CommandRegistry, CommandTable};

use crate::context::load_config;

/// Run the `isaac commands list` command.
pub fn list(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = CommandRegistry::new().with_tier_overrides(config.policy.tier_overrides.clone());
    let report = registry.load(&config.command_dirs);
    let table = registry.snapshot();

    if table.is_empty() {
        println!("No commands loaded.");
        for dir in &config.command_dirs {
            println!("  searched: {}", dir.display());
        }
    } else {
        println!("{:<20} {:<5} {:<24} SUMMARY", "NAME", "TIER", "TRIGGERS");
        for descriptor in table.list() {
            println!("{}", describe(&descriptor));
        }
    }
    for error in &report.errors {
        eprintln!("skipped {error}");
    }
    Ok(())
}

/// Run the `isaac commands check` command.
///
/// Validates every manifest under `dir`, including trigger conflicts, and
/// fails if any was rejected.
pub fn check(dir: &Path) -> Result<()> {
    let discovery = discover_commands(dir);
    let mut errors = discovery.errors;
    let (table, conflicts) = CommandTable::build(discovery.descriptors);
    errors.extend(conflicts);

    for descriptor in table.list() {
        println!("  OK    {} (tier {})", descriptor.name(), descriptor.tier());
    }
    for error in &errors {
        println!("  FAIL  {error}");
    }
    println!("{} valid, {} rejected", table.len(), errors.len());

    if !errors.is_empty() {
        bail!("{} manifest(s) under {} failed validation", errors.len(), dir.display());
    }
    Ok(())
}

fn describe(descriptor: &CommandDescriptor) -> String {
    let manifest = descriptor.manifest();
    let mut triggers = manifest.triggers.clone();
    triggers.extend(manifest.aliases.iter().cloned());
    triggers.extend(manifest.patterns.iter().map(|p| format!("/{p}/")));
    let mut line = format!(
        "{:<20} {:<5} {:<24} {}",
        descriptor.name(),
        descriptor.tier().to_string(),
        triggers.join(", "),
        manifest.summary
    );
    if descriptor.accepts_stdin() {
        line.push_str(" [stdin]");
    }
    if !descriptor.capabilities().is_empty() {
        line.push_str(&format!(" [{}]", descriptor.capabilities().join(", ")));
    }
    line.trim_end().to_string()
}
