//! Manifest-driven command registry for isaac.
//!
//! Commands are data: each one is a directory with a `command.toml`
//! manifest and an entry point. This crate discovers and validates them,
//! maps raw input to a command, and binds the argument tail to its schema.

pub mod binder;
pub mod descriptor;
pub mod discovery;
pub mod hot_reload;
pub mod manifest;
pub mod registry;
pub mod resolver;

pub use binder::{bind, split_pipeline, tokenize, ArgValue, BoundArgs};
pub use descriptor::CommandDescriptor;
pub use discovery::{discover_commands, Discovery, LoadError};
pub use hot_reload::{ManifestChange, ManifestWatcher};
pub use manifest::{
    parse_manifest, parse_manifest_file, validate_manifest, ArgSpec, ArgType, CommandManifest,
    OutputFormat, MANIFEST_FILENAME,
};
pub use registry::{CommandRegistry, CommandTable, LoadReport};
pub use resolver::{levenshtein, MatchKind, Resolved};
