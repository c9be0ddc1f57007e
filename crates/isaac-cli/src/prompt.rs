//! Terminal confirmations for the tier gate.
//!
//! Any prompt error (no terminal, closed stdin) counts as a "no", so a
//! non-interactive run never approves a gated command.

use dialoguer::{Confirm, Input, Select};
use tracing::debug;

use isaac_policy::{ConfirmRequest, Confirmer, Correction, CorrectionChoice};

/// Word a Tier 4 prompt must be answered with.
const STRICT_ANSWER: &str = "yes";

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn notice(&self, message: &str) {
        eprintln!("note: {message}");
    }

    fn confirm(&self, request: &ConfirmRequest) -> bool {
        eprintln!("{}", describe(request));

        let answer = if request.strict {
            Input::<String>::new()
                .with_prompt(format!("Type '{STRICT_ANSWER}' to run it"))
                .allow_empty(true)
                .interact_text()
                .map(|typed| is_strict_yes(&typed))
        } else {
            Confirm::new()
                .with_prompt("Run it?")
                .default(false)
                .interact()
        };
        answer.unwrap_or_else(|e| {
            debug!(error = %e, "confirmation unavailable, declining");
            false
        })
    }

    fn choose_correction(&self, original: &str, correction: &Correction) -> CorrectionChoice {
        let items = [
            format!("run corrected: {}", correction.corrected),
            format!("run original:  {original}"),
            "abort".to_string(),
        ];
        let selection = Select::new()
            .with_prompt(format!(
                "Did you mean '{}'? ({:.0}% confident)",
                correction.corrected,
                correction.confidence * 100.0
            ))
            .items(&items)
            .default(0)
            .interact();
        match selection {
            Ok(0) => CorrectionChoice::Corrected,
            Ok(1) => CorrectionChoice::Original,
            Ok(_) => CorrectionChoice::Abort,
            Err(e) => {
                debug!(error = %e, "correction prompt unavailable, aborting");
                CorrectionChoice::Abort
            }
        }
    }
}

/// The block printed above a confirmation prompt.
fn describe(request: &ConfirmRequest) -> String {
    let mut text = format!("[tier {}] {}", request.tier, request.command);
    if request.forced {
        text.push_str("\n  --force was given; this tier still requires confirmation");
    }
    if let Some(report) = &request.report {
        if !report.safe {
            text.push_str("\n  flagged as unsafe");
        }
        for warning in &report.warnings {
            text.push_str(&format!("\n  warning: {warning}"));
        }
        for suggestion in &report.suggestions {
            text.push_str(&format!("\n  suggestion: {suggestion}"));
        }
    }
    text
}

fn is_strict_yes(typed: &str) -> bool {
    typed.trim().eq_ignore_ascii_case(STRICT_ANSWER)
}
