//! Secret redaction for command output.
//!
//! [`SecretRedactor`] scrubs API keys, tokens, and passwords from text
//! before it is logged, displayed, or queued. Built-in patterns cover the
//! common key shapes; extra patterns come from config and manifests.

use regex::Regex;

/// Marker inserted in place of a secret.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone)]
struct RedactionRule {
    pattern: Regex,
    replacement: String,
}

/// Regex-based secret scrubber.
#[derive(Debug, Clone)]
pub struct SecretRedactor {
    rules: Vec<RedactionRule>,
}

impl Default for SecretRedactor {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretRedactor {
    /// A redactor with the built-in patterns.
    pub fn new() -> Self {
        let builtin: &[(&str, &str)] = &[
            // key = value style assignments: keep the key, drop the value.
            (
                r#"(?i)\b(password|passwd|pwd|secret|token|api[_-]?key|access[_-]?key|auth)\b(\s*[=:]\s*)("[^"]*"|'[^']*'|\S+)"#,
                "${1}${2}[REDACTED]",
            ),
            (r"(?i)\b(bearer)\s+[A-Za-z0-9._~+/=-]{8,}", "${1} [REDACTED]"),
            // Provider keys: sk-..., sk-ant-..., pk-...
            (r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}", REDACTED),
            // AWS access key ids.
            (r"\bAKIA[0-9A-Z]{16}\b", REDACTED),
            // GitHub tokens.
            (r"\bgh[pousr]_[A-Za-z0-9]{30,}\b", REDACTED),
            // Slack tokens.
            (r"\bxox[abprs]-[A-Za-z0-9-]{10,}", REDACTED),
        ];

        let rules = builtin
            .iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern).ok().map(|re| RedactionRule {
                    pattern: re,
                    replacement: (*replacement).to_string(),
                })
            })
            .collect();
        Self { rules }
    }

    /// Add a case-insensitive pattern whose matches become `[REDACTED]`.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<(), String> {
        let re = Regex::new(&format!("(?i){pattern}"))
            .map_err(|e| format!("invalid redaction pattern '{pattern}': {e}"))?;
        self.rules.push(RedactionRule {
            pattern: re,
            replacement: REDACTED.to_string(),
        });
        Ok(())
    }

    /// Built-ins plus `patterns`.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut redactor = Self::new();
        for pattern in patterns {
            redactor.add_pattern(pattern.as_ref())?;
        }
        Ok(redactor)
    }

    /// A copy of this redactor extended with `patterns`.
    pub fn extended(&self, patterns: &[String]) -> Result<Self, String> {
        let mut redactor = self.clone();
        for pattern in patterns {
            redactor.add_pattern(pattern)?;
        }
        Ok(redactor)
    }

    pub fn redact(&self, input: &str) -> String {
        let mut result = input.to_string();
        for rule in &self.rules {
            result = rule
                .pattern
                .replace_all(&result, rule.replacement.as_str())
                .into_owned();
        }
        result
    }
}
