//! Core types shared across all isaac crates.
//!
//! Defines tiers, the result envelope, configuration, and the error
//! taxonomy used by the registry, policy engine, executor, and queue.

pub mod config;
pub mod config_loader;
pub mod envelope;
pub mod error;
pub mod tier;

pub use config::{
    expand_home, isaac_home, ExecutionConfig, IsaacConfig, PolicyConfig, RemoteConfig, SyncConfig,
    CONFIG_FILENAME, QUEUE_FILENAME,
};
pub use config_loader::ConfigLoader;
pub use envelope::{meta, EnvelopeError, ErrorCode, Output, ResultEnvelope};
pub use error::{DispatchError, IsaacError, QueueError};
pub use tier::Tier;
