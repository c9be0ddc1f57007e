//! Bounded execution of isaac commands.
//!
//! Every command runs as a separate process group with a timeout, capped
//! output capture, an executable allowlist, and secret redaction applied
//! to whatever it prints.

pub mod capture;
pub mod executor;
pub mod kill;

pub use capture::{CaptureBuffer, Captured};
pub use executor::{resolve_program, DispatchRequest, ExecutionEngine, ExecutorConfig};
