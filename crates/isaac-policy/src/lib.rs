//! Security policy for isaac: tier gating before execution, plus the
//! allowlist and redaction rules the executor enforces while running.

pub mod allowlist;
pub mod classifier;
pub mod engine;
pub mod heuristics;
pub mod redaction;
pub mod signals;

pub use allowlist::ExecutableAllowlist;
pub use classifier::TierClassifier;
pub use engine::{GateDecision, PolicyEngine};
pub use heuristics::HeuristicValidator;
pub use redaction::{SecretRedactor, REDACTED};
pub use signals::{
    ConfirmRequest, Confirmer, Correction, CorrectionChoice, Corrector, DenyAll, NoCorrections,
    ValidationReport, Validator,
};
