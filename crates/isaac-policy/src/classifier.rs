//! Default tier table for commands with no manifest of their own.
//!
//! Used when a remote command does not resolve locally: the first word is
//! looked up here, with user overrides first. Unknown words are Tier 3.

use std::collections::BTreeMap;
use std::path::Path;

use isaac_types::Tier;

const DEFAULT_TIERS: &[(Tier, &[&str])] = &[
    (Tier::Instant, &["ls", "cd", "clear", "pwd", "echo", "cat"]),
    (Tier::AutoCorrect, &["grep", "head", "tail", "sort", "uniq"]),
    (Tier::CorrectConfirm, &["find", "sed", "awk"]),
    (Tier::Elevated, &["cp", "mv", "git", "npm", "pip", "reset"]),
    (Tier::Lockdown, &["rm", "del", "format", "dd"]),
];

/// Maps a command word to a tier.
#[derive(Debug, Clone, Default)]
pub struct TierClassifier {
    overrides: BTreeMap<String, Tier>,
}

impl TierClassifier {
    pub fn new(overrides: BTreeMap<String, Tier>) -> Self {
        Self { overrides }
    }

    /// Tier for a full command line, judged by its first word.
    pub fn classify(&self, command: &str) -> Tier {
        let Some(first) = command.split_whitespace().next() else {
            return Tier::Elevated;
        };
        // `/usr/bin/rm` classifies as `rm`.
        let word = Path::new(first)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(first)
            .to_lowercase();

        if let Some(&tier) = self.overrides.get(&word) {
            return tier;
        }
        DEFAULT_TIERS
            .iter()
            .find(|(_, words)| words.contains(&word.as_str()))
            .map_or(Tier::Elevated, |(tier, _)| *tier)
    }
}
