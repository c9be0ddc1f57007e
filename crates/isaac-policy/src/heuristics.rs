//! Pattern-based validation for elevated commands.
//!
//! Patterns are matched case-insensitively with `contains()`, so
//! `sudo RM -RF /` still trips `rm -rf /`.

use crate::signals::{ValidationReport, Validator};

/// Patterns that make a command unsafe outright.
pub const DESTRUCTIVE_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf /", "recursive delete from the filesystem root"),
    ("rm -rf ~", "recursive delete of the home directory"),
    (":(){ :|:& };:", "fork bomb"),
    ("mkfs", "formats a filesystem"),
    ("dd if=", "raw disk copy"),
    ("> /dev/sd", "writes directly to a block device"),
    ("chmod -r 777", "recursively opens permissions to everyone"),
    ("chmod 777", "opens permissions to everyone"),
    ("> /etc/", "overwrites a system configuration file"),
];

/// Patterns worth a warning but not unsafe on their own.
pub const CAUTION_PATTERNS: &[(&str, &str, &str)] = &[
    ("| sh", "pipes downloaded content into a shell", "download and inspect the script first"),
    ("| bash", "pipes downloaded content into a shell", "download and inspect the script first"),
    ("sudo ", "runs with elevated privileges", "check whether elevation is needed"),
    ("--force", "skips safety checks", "try without --force first"),
    ("git reset --hard", "discards uncommitted changes", "stash changes first"),
    ("git push -f", "rewrites remote history", "use --force-with-lease"),
    ("git clean -fd", "deletes untracked files", "preview with git clean -n"),
];

/// Validator backed by [`DESTRUCTIVE_PATTERNS`] and [`CAUTION_PATTERNS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicValidator;

impl HeuristicValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for HeuristicValidator {
    fn validate(&self, input: &str) -> ValidationReport {
        let lower = input.to_lowercase();
        let mut report = ValidationReport::default();

        for (pattern, why) in DESTRUCTIVE_PATTERNS {
            if lower.contains(pattern) {
                report.safe = false;
                report.warnings.push(format!("{why} ('{pattern}')"));
            }
        }
        for (pattern, why, suggestion) in CAUTION_PATTERNS {
            if lower.contains(pattern) {
                report.warnings.push(format!("{why} ('{}')", pattern.trim()));
                report.suggestions.push((*suggestion).to_string());
            }
        }
        report
    }
}
