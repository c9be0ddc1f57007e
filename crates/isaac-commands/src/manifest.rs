//! Command manifest parsing and validation.
//!
//! Each command lives in its own directory with a `command.toml` that
//! declares its triggers, argument schema, tier, resource limits, and
//! entry point.

use std::collections::HashSet;
use std::path::{Component, Path};

use anyhow::{bail, Context, Result};
use isaac_types::Tier;
use serde::{Deserialize, Serialize};

/// Expected manifest filename inside each command directory.
pub const MANIFEST_FILENAME: &str = "command.toml";

const MAX_NAME_LEN: usize = 64;
const MAX_SUMMARY_LEN: usize = 100;
const MIN_TIMEOUT_MS: u64 = 100;

/// A parsed command manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandManifest {
    /// Stable command name (`^[a-z][a-z0-9_-]*$`).
    pub name: String,
    /// Semantic version string (X.Y.Z).
    pub version: String,
    #[serde(default)]
    pub summary: String,
    /// Literal prefix triggers, e.g. `/status` or `status`.
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Regular-expression triggers, tried after literal prefixes.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Exact-match words.
    #[serde(default)]
    pub aliases: Vec<String>,
    pub tier: Tier,
    /// Whether the command accepts piped input.
    #[serde(default)]
    pub stdin: bool,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub resources: Resources,
    pub runtime: RuntimeSpec,
    #[serde(default)]
    pub telemetry: Telemetry,
}

/// How stdout of the command should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Int,
    Bool,
    Enum,
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::String => write!(f, "string"),
            ArgType::Int => write!(f, "int"),
            ArgType::Bool => write!(f, "bool"),
            ArgType::Enum => write!(f, "enum"),
        }
    }
}

/// One entry of the ordered argument schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArgType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help: String,
    /// Regex a string value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values for `enum` arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_kib: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Entry point, relative to the command directory.
    pub entry: String,
    /// Interpreter override. When absent it is chosen by file extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Extra patterns redacted from this command's output.
    #[serde(default)]
    pub redact_patterns: Vec<String>,
}

/// Parse a manifest from a TOML string.
pub fn parse_manifest(toml_str: &str) -> Result<CommandManifest> {
    toml::from_str(toml_str).context("failed to parse command manifest TOML")
}

/// Parse a manifest from a file path.
pub fn parse_manifest_file(path: &Path) -> Result<CommandManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_manifest(&content)
}

/// Validate a parsed manifest.
///
/// Regex compilation is checked separately when the descriptor is built.
pub fn validate_manifest(manifest: &CommandManifest) -> Result<()> {
    validate_identifier("command name", &manifest.name)?;
    validate_semver(&manifest.version)?;
    if manifest.summary.chars().count() > MAX_SUMMARY_LEN {
        bail!("summary exceeds {MAX_SUMMARY_LEN} characters");
    }

    if manifest.triggers.is_empty() && manifest.patterns.is_empty() && manifest.aliases.is_empty()
    {
        bail!("command '{}' declares no triggers, patterns, or aliases", manifest.name);
    }
    // Literal triggers may span several words ("git log"); aliases are one word.
    for trigger in &manifest.triggers {
        let body = trigger.strip_prefix('/').unwrap_or(trigger);
        for word in body.split(' ') {
            validate_identifier("trigger", word)
                .with_context(|| format!("invalid trigger '{trigger}'"))?;
        }
    }
    for alias in &manifest.aliases {
        validate_identifier("alias", alias).with_context(|| format!("invalid alias '{alias}'"))?;
    }
    for pattern in &manifest.patterns {
        if pattern.is_empty() {
            bail!("trigger patterns must not be empty");
        }
    }

    validate_args(&manifest.args)?;

    if let Some(timeout) = manifest.resources.timeout_ms {
        if timeout < MIN_TIMEOUT_MS {
            bail!("resources.timeout_ms must be at least {MIN_TIMEOUT_MS}, got {timeout}");
        }
    }
    if manifest.resources.max_output_kib == Some(0) {
        bail!("resources.max_output_kib must be at least 1");
    }

    validate_entry(&manifest.runtime.entry)?;
    if let Some(interp) = &manifest.runtime.interpreter {
        if interp.is_empty() || interp.contains(['/', '\\', ' ']) {
            bail!("runtime.interpreter must be a bare executable name, got: '{interp}'");
        }
    }

    let mut seen = HashSet::new();
    for cap in &manifest.capabilities {
        if cap.is_empty() {
            bail!("capabilities must not contain empty entries");
        }
        if !seen.insert(cap.as_str()) {
            bail!("duplicate capability: {cap}");
        }
    }

    Ok(())
}

/// Lowercase ASCII start, then lowercase alphanumerics, `-` or `_`.
fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{what} must not be empty");
    }
    if value.len() > MAX_NAME_LEN {
        bail!("{what} exceeds maximum length of {MAX_NAME_LEN} characters: {value}");
    }
    let mut chars = value.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !first_ok || !rest_ok {
        bail!(
            "{what} must start with a lowercase letter and contain only lowercase letters, digits, '-' or '_': {value}"
        );
    }
    Ok(())
}

fn validate_semver(version: &str) -> Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || p.parse::<u64>().is_err()) {
        bail!("version must be semver (X.Y.Z), got: {version}");
    }
    Ok(())
}

fn validate_args(args: &[ArgSpec]) -> Result<()> {
    let mut names = HashSet::new();
    for arg in args {
        validate_identifier("argument name", &arg.name)?;
        if !names.insert(arg.name.as_str()) {
            bail!("duplicate argument: {}", arg.name);
        }
        match arg.kind {
            ArgType::Enum if arg.values.is_empty() => {
                bail!("enum argument '{}' must list its allowed values", arg.name)
            }
            ArgType::Enum | ArgType::String => {}
            _ if arg.pattern.is_some() => {
                bail!("argument '{}': pattern is only valid for string arguments", arg.name)
            }
            _ => {}
        }
    }
    Ok(())
}

/// Reject absolute entry points and any `..` component.
fn validate_entry(entry: &str) -> Result<()> {
    if entry.is_empty() {
        bail!("runtime.entry must not be empty");
    }
    let path = Path::new(entry);
    if path.is_absolute() || entry.starts_with('\\') {
        bail!("runtime.entry must be relative to the command directory: {entry}");
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        bail!("runtime.entry must not contain path traversal (..): {entry}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        name = "status"
        version = "1.0.0"
        summary = "Show system status"
        triggers = ["/status", "status"]
        aliases = ["st"]
        tier = 1

        [runtime]
        entry = "run.sh"
    "#;

    fn valid() -> CommandManifest {
        parse_manifest(VALID).unwrap()
    }

    #[test]
    fn parses_minimal_manifest_with_defaults() {
        let m = valid();
        assert_eq!(m.name, "status");
        assert_eq!(m.tier, Tier::Instant);
        assert!(!m.stdin);
        assert_eq!(m.output, OutputFormat::Text);
        assert!(m.args.is_empty());
        assert_eq!(m.resources, Resources::default());
        validate_manifest(&m).unwrap();
    }

    #[test]
    fn parses_full_manifest() {
        let m = parse_manifest(
            r#"
            name = "find-files"
            version = "0.2.1"
            triggers = ["/find"]
            patterns = ['^where is (\S+)']
            tier = 2.5
            stdin = true
            output = "json"
            capabilities = ["filesystem"]

            [[args]]
            name = "path"
            type = "string"
            required = true
            pattern = '^[\w./-]+$'

            [[args]]
            name = "depth"
            type = "int"

            [[args]]
            name = "mode"
            type = "enum"
            values = ["fast", "deep"]

            [resources]
            timeout_ms = 2000
            max_output_kib = 16

            [runtime]
            entry = "bin/find.py"
            interpreter = "python3"

            [telemetry]
            redact_patterns = ["secret-\\w+"]
            "#,
        )
        .unwrap();
        validate_manifest(&m).unwrap();
        assert_eq!(m.tier, Tier::CorrectConfirm);
        assert_eq!(m.args.len(), 3);
        assert_eq!(m.args[2].kind, ArgType::Enum);
        assert_eq!(m.resources.timeout_ms, Some(2000));
        assert_eq!(m.output, OutputFormat::Json);
    }

    #[test]
    fn missing_tier_fails_to_parse() {
        let err = parse_manifest(
            r#"
            name = "x"
            version = "1.0.0"
            triggers = ["x"]
            [runtime]
            entry = "run.sh"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("tier"), "got: {err:#}");
    }

    #[test]
    fn invalid_tier_fails_to_parse() {
        let text = VALID.replace("tier = 1", "tier = 3.5");
        assert!(parse_manifest(&text).is_err());
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "Status", "9lives", "rm;ls", "a b", &"x".repeat(65)] {
            let mut m = valid();
            m.name = name.to_string();
            assert!(validate_manifest(&m).is_err(), "name {name:?} should be rejected");
        }
    }

    #[test]
    fn rejects_bad_version() {
        for version in ["1.0", "1.0.0.0", "v1.0.0", "1..0"] {
            let mut m = valid();
            m.version = version.to_string();
            let err = validate_manifest(&m).unwrap_err();
            assert!(err.to_string().contains("semver"), "got: {err}");
        }
    }

    #[test]
    fn rejects_long_summary() {
        let mut m = valid();
        m.summary = "s".repeat(101);
        assert!(validate_manifest(&m).is_err());
    }

    #[test]
    fn rejects_command_without_triggers() {
        let mut m = valid();
        m.triggers.clear();
        m.aliases.clear();
        let err = validate_manifest(&m).unwrap_err();
        assert!(err.to_string().contains("no triggers"), "got: {err}");
    }

    #[test]
    fn rejects_bad_trigger_word() {
        let mut m = valid();
        m.triggers.push("/Bad Trigger".into());
        assert!(validate_manifest(&m).is_err());

        let mut m = valid();
        m.triggers.push("git  log".into());
        assert!(validate_manifest(&m).is_err(), "double space leaves an empty word");
    }

    #[test]
    fn accepts_multi_word_trigger() {
        let mut m = valid();
        m.triggers.push("git log".into());
        validate_manifest(&m).unwrap();
    }

    #[test]
    fn rejects_multi_word_alias() {
        let mut m = valid();
        m.aliases.push("git log".into());
        let err = validate_manifest(&m).unwrap_err();
        assert!(format!("{err:#}").contains("invalid alias"), "got: {err:#}");
    }

    #[test]
    fn rejects_enum_without_values() {
        let mut m = valid();
        m.args.push(ArgSpec {
            name: "mode".into(),
            kind: ArgType::Enum,
            required: false,
            help: String::new(),
            pattern: None,
            values: vec![],
        });
        let err = validate_manifest(&m).unwrap_err();
        assert!(err.to_string().contains("allowed values"), "got: {err}");
    }

    #[test]
    fn rejects_duplicate_args() {
        let mut m = valid();
        let arg = ArgSpec {
            name: "path".into(),
            kind: ArgType::String,
            required: true,
            help: String::new(),
            pattern: None,
            values: vec![],
        };
        m.args.push(arg.clone());
        m.args.push(arg);
        let err = validate_manifest(&m).unwrap_err();
        assert!(err.to_string().contains("duplicate argument"), "got: {err}");
    }

    #[test]
    fn rejects_entry_traversal() {
        for entry in ["../escape.sh", "bin/../../x", "/usr/bin/env", ""] {
            let mut m = valid();
            m.runtime.entry = entry.to_string();
            assert!(validate_manifest(&m).is_err(), "entry {entry:?} should be rejected");
        }
    }

    #[test]
    fn rejects_tiny_timeout() {
        let mut m = valid();
        m.resources.timeout_ms = Some(50);
        assert!(validate_manifest(&m).is_err());
        m.resources.timeout_ms = Some(100);
        validate_manifest(&m).unwrap();
    }

    #[test]
    fn rejects_interpreter_paths() {
        let mut m = valid();
        m.runtime.interpreter = Some("/bin/bash".into());
        assert!(validate_manifest(&m).is_err());
    }

    #[test]
    fn parse_manifest_file_reports_path() {
        let err = parse_manifest_file(Path::new("/nonexistent/command.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/command.toml"), "got: {err}");
    }
}
