//! Build the dispatcher and its collaborators from configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use isaac_commands::CommandRegistry;
use isaac_dispatch::Dispatcher;
use isaac_exec::{ExecutionEngine, ExecutorConfig};
use isaac_policy::{
    ExecutableAllowlist, HeuristicValidator, PolicyEngine, SecretRedactor, TierClassifier,
};
use isaac_queue::{link_from_config, DurableQueue, RemoteLink, RemoteRouter, SyncSettings, SyncWorker};
use isaac_types::{ConfigLoader, IsaacConfig};

use crate::prompt::TerminalConfirmer;

/// Load the layered config, plus `explicit` when given.
pub fn load_config(explicit: Option<&Path>) -> Result<IsaacConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = explicit {
        loader = loader.with_explicit_path(path.to_path_buf());
    }
    loader.load().context("failed to load configuration")
}

/// Load every configured command directory into a fresh registry.
pub fn load_registry(config: &IsaacConfig) -> Arc<CommandRegistry> {
    let registry =
        Arc::new(CommandRegistry::new().with_tier_overrides(config.policy.tier_overrides.clone()));
    reload(&registry, config);
    registry
}

/// Rebuild the registry table, logging anything that was skipped.
pub fn reload(registry: &CommandRegistry, config: &IsaacConfig) -> usize {
    let report = registry.load(&config.command_dirs);
    for error in &report.errors {
        warn!(path = %error.path.display(), error = %error.message, "skipped command");
    }
    report.count
}

pub fn open_queue(config: &IsaacConfig) -> Result<Arc<DurableQueue>> {
    let queue = DurableQueue::open(&config.queue_path)
        .with_context(|| format!("failed to open queue at {}", config.queue_path.display()))?;
    Ok(Arc::new(queue))
}

pub fn remote_link(config: &IsaacConfig) -> Result<Arc<dyn RemoteLink>> {
    link_from_config(&config.remote, config.sync.delivery_timeout())
        .context("invalid remote endpoint")
}

/// Built-in redaction plus `policy.redact_patterns`.
pub fn redactor(config: &IsaacConfig) -> Result<SecretRedactor> {
    SecretRedactor::new()
        .extended(&config.policy.redact_patterns)
        .map_err(anyhow::Error::msg)
        .context("invalid policy.redact_patterns")
}

/// A sync worker over `queue`, with an optional completion callback.
pub fn sync_worker(
    config: &IsaacConfig,
    queue: Arc<DurableQueue>,
    link: Arc<dyn RemoteLink>,
    on_complete: Option<isaac_queue::CompletionCallback>,
) -> Result<Arc<SyncWorker>> {
    let mut worker = SyncWorker::new(queue, link, SyncSettings::from(&config.sync))
        .with_redactor(redactor(config)?);
    if let Some(callback) = on_complete {
        worker = worker.on_complete(callback);
    }
    Ok(Arc::new(worker))
}

/// Everything a dispatch needs, wired from `config`.
pub fn build_dispatcher(
    config: &IsaacConfig,
    registry: Arc<CommandRegistry>,
    on_complete: Option<isaac_queue::CompletionCallback>,
) -> Result<Dispatcher> {
    let redactor = redactor(config)?;
    let policy = PolicyEngine::new(Arc::new(TerminalConfirmer))
        .with_validator(Arc::new(HeuristicValidator::new()))
        .with_redactor(redactor.clone())
        .with_config(&config.policy);

    let allowlist =
        ExecutableAllowlist::platform_default().with_extra(config.execution.extra_allowlist.iter());
    let executor =
        ExecutionEngine::new(ExecutorConfig::from(&config.execution), allowlist, redactor.clone());

    let queue = open_queue(config)?;
    let link = remote_link(config)?;
    let router = RemoteRouter::new(
        Arc::clone(&link),
        Arc::clone(&queue),
        config.sync.delivery_timeout(),
    )
    .with_redactor(redactor);
    let worker = sync_worker(config, queue, link, on_complete)?;

    Ok(Dispatcher::new(registry, policy, executor)
        .with_classifier(TierClassifier::new(config.policy.tier_overrides.clone()))
        .with_remote(router, worker))
}
