//! Layered configuration loading.
//!
//! Sources, later overriding earlier:
//! 1. Built-in defaults ([`IsaacConfig::default()`])
//! 2. User-level: `~/.isaac/config.toml`
//! 3. Workspace-level: `./.isaac/config.toml`
//! 4. `ISAAC_*` environment variables

use std::path::{Path, PathBuf};

use crate::config::{isaac_home, IsaacConfig, CONFIG_FILENAME};
use crate::IsaacError;

/// Files larger than this are rejected.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Environment variables mapped onto config keys.
const ENV_QUEUE_PATH: &str = "ISAAC_QUEUE_PATH";
const ENV_REMOTE_ENDPOINT: &str = "ISAAC_REMOTE_ENDPOINT";
const ENV_COMMAND_DIRS: &str = "ISAAC_COMMAND_DIRS";

/// Builder for loading an [`IsaacConfig`] from all layers.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    workspace_config_path: Option<PathBuf>,
    /// An explicit file (e.g. from `--config`) layered last before env vars.
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_workspace_path(mut self, path: PathBuf) -> Self {
        self.workspace_config_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_explicit_path(mut self, path: PathBuf) -> Self {
        self.explicit_path = Some(path);
        self
    }

    /// Load using the process environment.
    pub fn load(&self) -> Result<IsaacConfig, IsaacError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load with a caller-supplied environment lookup.
    pub fn load_with_env<F>(&self, env: F) -> Result<IsaacConfig, IsaacError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut merged = toml::Value::try_from(IsaacConfig::default())
            .map_err(|e| IsaacError::ConfigError(format!("failed to serialize defaults: {e}")))?;

        let user_path = self
            .user_config_path
            .clone()
            .unwrap_or_else(|| isaac_home().join(CONFIG_FILENAME));
        let workspace_path = self
            .workspace_config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(".isaac").join(CONFIG_FILENAME));

        for (label, path) in [("user", user_path), ("workspace", workspace_path)] {
            if path.exists() {
                merge_file(&mut merged, &path, label)?;
            }
        }
        if let Some(path) = &self.explicit_path {
            // An explicitly requested file must exist.
            merge_file(&mut merged, path, "explicit")?;
        }

        let mut config: IsaacConfig = merged
            .try_into()
            .map_err(|e| IsaacError::ConfigError(format!("failed to parse merged config: {e}")))?;

        apply_env_overrides(&mut config, env)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }
}

fn merge_file(merged: &mut toml::Value, path: &Path, label: &str) -> Result<(), IsaacError> {
    let content = read_config_file(path)?;
    let layer: toml::Value = toml::from_str(&content)
        .map_err(|e| IsaacError::ConfigError(format!("invalid {label} config: {e}")))?;
    deep_merge(merged, &layer);
    Ok(())
}

/// Read a config file, rejecting oversized files and NUL bytes.
fn read_config_file(path: &Path) -> Result<String, IsaacError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        IsaacError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(IsaacError::ConfigError(format!(
            "config file {} exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        IsaacError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if content.contains('\0') {
        return Err(IsaacError::ConfigError(format!(
            "config file {} contains null bytes",
            path.display()
        )));
    }
    Ok(content)
}

fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn apply_env_overrides<F>(config: &mut IsaacConfig, env: F) -> Result<(), IsaacError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env(ENV_QUEUE_PATH) {
        validate_env_value(ENV_QUEUE_PATH, &value)?;
        config.queue_path = PathBuf::from(value);
    }
    if let Some(value) = env(ENV_REMOTE_ENDPOINT) {
        validate_env_value(ENV_REMOTE_ENDPOINT, &value)?;
        config.remote.endpoint = (!value.trim().is_empty()).then(|| value.trim().to_string());
    }
    if let Some(value) = env(ENV_COMMAND_DIRS) {
        validate_env_value(ENV_COMMAND_DIRS, &value)?;
        config.command_dirs = std::env::split_paths(&value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
    }
    Ok(())
}

fn validate_env_value(var_name: &str, value: &str) -> Result<(), IsaacError> {
    if value.chars().any(|ch| ch.is_control()) {
        return Err(IsaacError::ConfigError(format!(
            "environment variable {var_name} contains control characters"
        )));
    }
    Ok(())
}
