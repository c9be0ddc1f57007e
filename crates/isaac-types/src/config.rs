//! Runtime configuration, serialized as TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{IsaacError, Tier};

/// Name of the configuration file inside an isaac home directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Name of the queue database inside an isaac home directory.
pub const QUEUE_FILENAME: &str = "queue.db";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsaacConfig {
    /// Directories scanned for command subdirectories.
    pub command_dirs: Vec<PathBuf>,
    /// SQLite file backing the durable queue.
    pub queue_path: PathBuf,
    pub execution: ExecutionConfig,
    pub policy: PolicyConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Timeout applied when a manifest does not set `resources.timeout_ms`.
    pub default_timeout_ms: u64,
    /// Output cap applied when a manifest does not set `resources.max_output_kib`.
    pub default_max_output_kib: u64,
    /// Executables allowed on top of the platform allowlist.
    pub extra_allowlist: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
            default_max_output_kib: 64,
            extra_allowlist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub auto_correct_threshold: f64,
    pub confirm_correct_threshold: f64,
    /// Extra secret patterns, added to the built-in set.
    pub redact_patterns: Vec<String>,
    /// Per-command tier overrides keyed by command name.
    pub tier_overrides: BTreeMap<String, Tier>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_correct_threshold: 0.8,
            confirm_correct_threshold: 0.7,
            redact_patterns: Vec::new(),
            tier_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub max_interval_secs: u64,
    pub batch_size: usize,
    pub stale_after_secs: u64,
    pub retention_days: u64,
    pub stop_timeout_secs: u64,
    pub delivery_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_interval_secs: 300,
            batch_size: 10,
            stale_after_secs: 300,
            retention_days: 7,
            stop_timeout_secs: 5,
            delivery_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the relay that reaches other devices. `None` means offline.
    pub endpoint: Option<String>,
}

impl Default for IsaacConfig {
    fn default() -> Self {
        Self::default_for(&isaac_home())
    }
}

impl IsaacConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, IsaacError> {
        toml::from_str(content).map_err(|e| IsaacError::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, IsaacError> {
        toml::to_string_pretty(self).map_err(|e| IsaacError::ConfigError(e.to_string()))
    }

    /// Default configuration rooted at `base_dir`.
    pub fn default_for(base_dir: &Path) -> Self {
        Self {
            command_dirs: vec![base_dir.join("commands")],
            queue_path: base_dir.join(QUEUE_FILENAME),
            execution: ExecutionConfig::default(),
            policy: PolicyConfig::default(),
            sync: SyncConfig::default(),
            remote: RemoteConfig::default(),
        }
    }

    /// Expand a leading `~/` in every configured path.
    pub fn expand_paths(&mut self) {
        for dir in &mut self.command_dirs {
            *dir = expand_home(dir);
        }
        self.queue_path = expand_home(&self.queue_path);
    }

    pub fn validate(&self) -> Result<(), IsaacError> {
        let thresholds = [
            ("auto_correct_threshold", self.policy.auto_correct_threshold),
            (
                "confirm_correct_threshold",
                self.policy.confirm_correct_threshold,
            ),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(IsaacError::ConfigError(format!(
                    "policy.{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if self.sync.interval_secs == 0 {
            return Err(IsaacError::ConfigError(
                "sync.interval_secs must be at least 1".into(),
            ));
        }
        if self.sync.max_interval_secs < self.sync.interval_secs {
            return Err(IsaacError::ConfigError(format!(
                "sync.max_interval_secs ({}) is below sync.interval_secs ({})",
                self.sync.max_interval_secs, self.sync.interval_secs
            )));
        }
        if self.sync.batch_size == 0 {
            return Err(IsaacError::ConfigError(
                "sync.batch_size must be at least 1".into(),
            ));
        }
        if self.execution.default_timeout_ms < 100 {
            return Err(IsaacError::ConfigError(
                "execution.default_timeout_ms must be at least 100".into(),
            ));
        }
        Ok(())
    }
}

/// The isaac home directory, `~/.isaac`.
pub fn isaac_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".isaac")
}

/// Replace a leading `~/` with `$HOME/`.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(rest)
        }
        Err(_) => path.to_path_buf(),
    }
}
