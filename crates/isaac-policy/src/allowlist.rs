//! Platform executable allowlist.
//!
//! Only programs named here may be spawned. The check is on the program's
//! file name, so `/usr/bin/python3` and `python3` are the same entry.

use std::collections::BTreeSet;
use std::path::Path;

use isaac_types::DispatchError;

#[cfg(windows)]
const PLATFORM_DEFAULTS: &[&str] = &["cmd", "powershell", "pwsh", "python", "python3", "node"];

#[cfg(target_os = "macos")]
const PLATFORM_DEFAULTS: &[&str] = &[
    "sh", "bash", "zsh", "python3", "node", "ruby", "perl", "pwsh", "osascript",
];

#[cfg(all(unix, not(target_os = "macos")))]
const PLATFORM_DEFAULTS: &[&str] = &[
    "sh", "bash", "dash", "zsh", "python3", "python", "node", "ruby", "perl", "pwsh",
];

#[derive(Debug, Clone)]
pub struct ExecutableAllowlist {
    allowed: BTreeSet<String>,
}

impl Default for ExecutableAllowlist {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl ExecutableAllowlist {
    pub fn platform_default() -> Self {
        Self {
            allowed: PLATFORM_DEFAULTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// An allowlist with only the given entries.
    pub fn only<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: entries.into_iter().map(|s| normalize(s.as_ref())).collect(),
        }
    }

    #[must_use]
    pub fn with_extra<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed
            .extend(entries.into_iter().map(|s| normalize(s.as_ref())));
        self
    }

    pub fn is_allowed(&self, program: &str) -> bool {
        !program.is_empty() && self.allowed.contains(&normalize(program))
    }

    /// Fail closed for anything not on the list.
    pub fn check(&self, program: &str) -> Result<(), DispatchError> {
        if self.is_allowed(program) {
            Ok(())
        } else {
            Err(DispatchError::NotAllowlisted {
                program: program.to_string(),
            })
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// File name only; on Windows also lowercase and without `.exe`.
fn normalize(program: &str) -> String {
    let name = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    if cfg!(windows) {
        let lower = name.to_lowercase();
        lower.strip_suffix(".exe").unwrap_or(&lower).to_string()
    } else {
        name.to_string()
    }
}
