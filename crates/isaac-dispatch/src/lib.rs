//! Dispatch for isaac: one entry point from raw input to [`ResultEnvelope`].
//!
//! [`Dispatcher`] ties the registry, the tier gate, the executor, and the
//! remote router together, and exposes the queue status surface used by
//! front ends for the offline indicator and `/sync`.
//!
//! [`ResultEnvelope`]: isaac_types::ResultEnvelope

pub mod dispatcher;
pub mod pipeline;
pub mod remote;

#[cfg(all(test, unix))]
mod testing;

pub use dispatcher::{DispatchOptions, Dispatcher};
pub use remote::parse_remote;
