//! Collaborator interfaces consumed by the tier gate.
//!
//! Corrections and validations come from outside the policy engine (an
//! AI translator, a heuristic table, a test fake). Confirmation is whatever
//! the front end uses to ask the user.

use isaac_types::Tier;

/// A proposed rewrite of the user's input.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub corrected: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

/// Source of correction signals for Tiers 2 and 2.5.
pub trait Corrector: Send + Sync {
    fn suggest(&self, input: &str) -> Option<Correction>;
}

/// Outcome of a validation pass for Tier 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub safe: bool,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            safe: true,
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Source of validation signals for Tier 3.
pub trait Validator: Send + Sync {
    fn validate(&self, input: &str) -> ValidationReport;
}

/// Everything the user sees before approving a command.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmRequest {
    pub command: String,
    pub tier: Tier,
    pub report: Option<ValidationReport>,
    /// Require a typed confirmation rather than a y/n key.
    pub strict: bool,
    /// A force override was requested; it is shown, never honored silently.
    pub forced: bool,
}

/// The user's answer when shown an original and a corrected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionChoice {
    Corrected,
    Original,
    Abort,
}

/// Front-end hook for notices and confirmations.
pub trait Confirmer: Send + Sync {
    /// One-line informational notice, e.g. a silent substitution.
    fn notice(&self, message: &str);

    fn confirm(&self, request: &ConfirmRequest) -> bool;

    fn choose_correction(&self, original: &str, correction: &Correction) -> CorrectionChoice;
}

/// Corrector that never proposes anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCorrections;

impl Corrector for NoCorrections {
    fn suggest(&self, _input: &str) -> Option<Correction> {
        None
    }
}

/// Confirmer for non-interactive contexts: declines every prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl Confirmer for DenyAll {
    fn notice(&self, message: &str) {
        tracing::info!(%message, "policy notice");
    }

    fn confirm(&self, _request: &ConfirmRequest) -> bool {
        false
    }

    fn choose_correction(&self, _original: &str, _correction: &Correction) -> CorrectionChoice {
        CorrectionChoice::Abort
    }
}
