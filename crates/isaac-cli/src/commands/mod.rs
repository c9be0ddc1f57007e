//! CLI command implementations for the `isaac` binary.

pub mod commands;
pub mod queue;
pub mod run;
pub mod shell;

use isaac_types::{meta, Output, ResultEnvelope};

/// Human rendering of an envelope: what goes to stdout and what goes to
/// stderr.
pub fn render(envelope: &ResultEnvelope) -> (String, String) {
    if let Some(error) = &envelope.error {
        let mut err = format!("error [{}]: {}", error.code, error.message);
        if let Some(hint) = &error.hint {
            err.push_str(&format!("\n  hint: {hint}"));
        }
        if let Some(stage) = envelope.meta_i64(meta::STAGE) {
            err.push_str(&format!("\n  at pipeline stage {}", stage + 1));
        }
        return (String::new(), err);
    }

    let out = match &envelope.output {
        Output::Json(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        other => other.to_text(),
    };

    let mut notes = Vec::new();
    if let Some(original) = envelope.meta.get(meta::CORRECTED_FROM).and_then(|v| v.as_str()) {
        notes.push(format!("corrected from: {original}"));
    }
    if envelope.is_truncated() {
        notes.push("output truncated".to_string());
    }
    if let Some(code) = envelope.meta_i64(meta::EXIT_CODE).filter(|c| *c != 0) {
        notes.push(format!("exit code {code}"));
    }
    if let Some(stderr) = envelope.meta.get(meta::STDERR).and_then(|v| v.as_str()) {
        if !stderr.trim().is_empty() {
            notes.push(stderr.trim_end().to_string());
        }
    }
    (out, notes.join("\n"))
}

/// Process exit status for a one-shot dispatch.
pub fn exit_code(envelope: &ResultEnvelope) -> i32 {
    if !envelope.ok {
        return 1;
    }
    match envelope.meta_i64(meta::EXIT_CODE) {
        Some(code) => i32::try_from(code).unwrap_or(1),
        None => 0,
    }
}
