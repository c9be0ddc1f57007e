//! Tier gate: decides whether, and in what form, a command may run.
//!
//! The tier is selected once and routed to exactly one handler. Nothing
//! downstream re-checks tiers; the executor only sees commands that passed.

use std::sync::Arc;

use isaac_types::{PolicyConfig, Tier};
use tracing::{info, warn};

use crate::heuristics::HeuristicValidator;
use crate::redaction::SecretRedactor;
use crate::signals::{
    ConfirmRequest, Confirmer, CorrectionChoice, Corrector, NoCorrections, ValidationReport,
    Validator,
};

/// What the gate decided for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Run `input`. When a correction was applied, `corrected_from` holds
    /// what the user originally typed.
    Proceed {
        input: String,
        corrected_from: Option<String>,
    },
    /// Do not run.
    Rejected { reason: String },
}

impl GateDecision {
    fn proceed(input: &str) -> Self {
        GateDecision::Proceed {
            input: input.to_string(),
            corrected_from: None,
        }
    }

    fn corrected(original: &str, corrected: &str) -> Self {
        GateDecision::Proceed {
            input: corrected.to_string(),
            corrected_from: Some(original.to_string()),
        }
    }

    fn declined() -> Self {
        GateDecision::Rejected {
            reason: "confirmation declined".into(),
        }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed { .. })
    }
}

/// Per-tier gate with injected correction, validation, and confirmation.
pub struct PolicyEngine {
    corrector: Arc<dyn Corrector>,
    validator: Arc<dyn Validator>,
    confirmer: Arc<dyn Confirmer>,
    redactor: SecretRedactor,
    auto_correct_threshold: f64,
    confirm_correct_threshold: f64,
}

impl PolicyEngine {
    /// Engine with no corrections and the heuristic validator.
    pub fn new(confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            corrector: Arc::new(NoCorrections),
            validator: Arc::new(HeuristicValidator::new()),
            confirmer,
            redactor: SecretRedactor::new(),
            auto_correct_threshold: 0.8,
            confirm_correct_threshold: 0.7,
        }
    }

    #[must_use]
    pub fn with_corrector(mut self, corrector: Arc<dyn Corrector>) -> Self {
        self.corrector = corrector;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Redactor applied to command text before it is logged.
    #[must_use]
    pub fn with_redactor(mut self, redactor: SecretRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: &PolicyConfig) -> Self {
        self.auto_correct_threshold = config.auto_correct_threshold;
        self.confirm_correct_threshold = config.confirm_correct_threshold;
        self
    }

    pub fn confirmer(&self) -> &dyn Confirmer {
        self.confirmer.as_ref()
    }

    /// `input` as it may appear in logs.
    pub fn loggable(&self, input: &str) -> String {
        self.redactor.redact(input)
    }

    /// Run the validator on its own, e.g. to record the result with a
    /// queued command.
    pub fn validate(&self, input: &str) -> ValidationReport {
        self.validator.validate(input)
    }

    /// Gate `input` at `tier`, accepting any correction.
    pub fn gate(&self, tier: Tier, input: &str, force: bool) -> GateDecision {
        self.gate_with(tier, input, force, &|_| true)
    }

    /// Gate `input` at `tier`. `accept_correction` may veto a proposed
    /// correction, e.g. one that resolves to a stricter command.
    pub fn gate_with(
        &self,
        tier: Tier,
        input: &str,
        force: bool,
        accept_correction: &dyn Fn(&str) -> bool,
    ) -> GateDecision {
        if force && tier != Tier::Lockdown {
            info!(%tier, "force flag has no effect below tier 4");
        }
        let decision = match tier {
            Tier::Instant => self.gate_instant(input),
            Tier::AutoCorrect => self.gate_auto_correct(input, accept_correction),
            Tier::CorrectConfirm => self.gate_correct_confirm(input, accept_correction),
            Tier::Elevated => self.gate_elevated(input),
            Tier::Lockdown => self.gate_lockdown(input, force),
        };
        if let GateDecision::Rejected { reason } = &decision {
            info!(%tier, %reason, "command not approved");
        }
        decision
    }

    fn gate_instant(&self, input: &str) -> GateDecision {
        GateDecision::proceed(input)
    }

    fn gate_auto_correct(&self, input: &str, accept: &dyn Fn(&str) -> bool) -> GateDecision {
        match self.corrector.suggest(input) {
            Some(c)
                if c.confidence >= self.auto_correct_threshold
                    && c.corrected != input
                    && accept(&c.corrected) =>
            {
                self.confirmer
                    .notice(&format!("auto-corrected: {input} -> {}", c.corrected));
                GateDecision::corrected(input, &c.corrected)
            }
            _ => GateDecision::proceed(input),
        }
    }

    fn gate_correct_confirm(&self, input: &str, accept: &dyn Fn(&str) -> bool) -> GateDecision {
        match self.corrector.suggest(input) {
            Some(c)
                if c.confidence >= self.confirm_correct_threshold
                    && c.corrected != input
                    && accept(&c.corrected) =>
            {
                match self.confirmer.choose_correction(input, &c) {
                    CorrectionChoice::Corrected => GateDecision::corrected(input, &c.corrected),
                    CorrectionChoice::Original => GateDecision::proceed(input),
                    CorrectionChoice::Abort => GateDecision::declined(),
                }
            }
            _ => self.confirm(input, Tier::CorrectConfirm, None, false, false),
        }
    }

    fn gate_elevated(&self, input: &str) -> GateDecision {
        let report = self.validator.validate(input);
        if !report.safe {
            warn!(warnings = ?report.warnings, "validation flagged command as unsafe");
        }
        self.confirm(input, Tier::Elevated, Some(report), false, false)
    }

    fn gate_lockdown(&self, input: &str, force: bool) -> GateDecision {
        if force {
            // Force is recorded and shown, but the prompt still runs.
            warn!(command = %self.loggable(input), "force override requested on tier 4 command");
        }
        let report = self.validator.validate(input);
        self.confirm(input, Tier::Lockdown, Some(report), true, force)
    }

    fn confirm(
        &self,
        input: &str,
        tier: Tier,
        report: Option<ValidationReport>,
        strict: bool,
        forced: bool,
    ) -> GateDecision {
        let request = ConfirmRequest {
            command: input.to_string(),
            tier,
            report,
            strict,
            forced,
        };
        if self.confirmer.confirm(&request) {
            GateDecision::proceed(input)
        } else {
            GateDecision::declined()
        }
    }
}
