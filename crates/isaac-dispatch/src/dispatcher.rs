//! The dispatch facade: raw input in, [`ResultEnvelope`] out.
//!
//! `resolve -> bind -> gate -> execute`, or `gate -> route` for remote
//! input. Every recoverable failure is an envelope; only a queue write
//! failure comes back as `Err`, since that is the one case where a command
//! could otherwise be lost.

use std::sync::Arc;

use tracing::{debug, info, warn};

use isaac_commands::{bind, split_pipeline, BoundArgs, CommandDescriptor, CommandRegistry, CommandTable};
use isaac_exec::{DispatchRequest, ExecutionEngine};
use isaac_policy::{GateDecision, PolicyEngine, TierClassifier};
use isaac_queue::{CycleReport, QueueSummary, RemoteRouter, SyncWorker};
use isaac_types::{meta, DispatchError, QueueError, ResultEnvelope, Tier};

/// Per-dispatch switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Passed to the Tier 4 gate, where it is logged and shown but never
    /// skips the confirmation.
    pub force: bool,
}

impl DispatchOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Router and worker sharing one durable queue.
pub(crate) struct RemoteSide {
    pub(crate) router: RemoteRouter,
    pub(crate) worker: Arc<SyncWorker>,
}

/// A resolved and bound command, not yet gated.
#[derive(Debug, Clone)]
pub(crate) struct Stage {
    pub(crate) descriptor: Arc<CommandDescriptor>,
    pub(crate) args: BoundArgs,
    pub(crate) input: String,
}

/// A stage the gate approved, possibly in corrected form.
#[derive(Debug, Clone)]
pub(crate) struct Approved {
    pub(crate) stage: Stage,
    pub(crate) corrected_from: Option<String>,
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    policy: PolicyEngine,
    executor: ExecutionEngine,
    pub(crate) classifier: TierClassifier,
    pub(crate) remote: Option<RemoteSide>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, policy: PolicyEngine, executor: ExecutionEngine) -> Self {
        Self {
            registry,
            policy,
            executor,
            classifier: TierClassifier::default(),
            remote: None,
        }
    }

    /// Tier table for remote commands that do not resolve locally.
    #[must_use]
    pub fn with_classifier(mut self, classifier: TierClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Enable `!target` routing and the queue status surface.
    #[must_use]
    pub fn with_remote(mut self, router: RemoteRouter, worker: Arc<SyncWorker>) -> Self {
        self.remote = Some(RemoteSide { router, worker });
        self
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn sync_worker(&self) -> Option<&Arc<SyncWorker>> {
        self.remote.as_ref().map(|r| &r.worker)
    }

    /// Dispatch one line of input.
    ///
    /// `!target cmd` is routed remotely, `a | b` is chained, anything else
    /// runs as a single local command.
    pub async fn dispatch(
        &self,
        input: &str,
        options: DispatchOptions,
    ) -> Result<ResultEnvelope, QueueError> {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix('!') {
            return self.dispatch_remote(rest, options).await;
        }

        let stages = split_pipeline(input);
        if stages.len() > 1 {
            return Ok(self.chain(&stages, options).await);
        }

        let table = self.registry.snapshot();
        let stage = match prepare(&table, input) {
            Ok(stage) => stage,
            Err(e) => {
                debug!(input, error = %e, "dispatch failed before gating");
                return Ok(e.into_envelope());
            }
        };
        let approved = match self.approve(&table, stage, options.force) {
            Ok(approved) => approved,
            Err(rejected) => return Ok(rejected),
        };
        Ok(self.run(approved, None, options.force).await)
    }

    /// Gate one stage, re-resolving the input if a correction was taken.
    pub(crate) fn approve(
        &self,
        table: &CommandTable,
        stage: Stage,
        force: bool,
    ) -> Result<Approved, ResultEnvelope> {
        let tier = stage.descriptor.tier();
        let accept = |candidate: &str| correction_allowed(table, tier, &stage.input, candidate);

        match self.policy.gate_with(tier, &stage.input, force, &accept) {
            GateDecision::Proceed {
                corrected_from: None,
                ..
            } => Ok(Approved {
                stage,
                corrected_from: None,
            }),
            GateDecision::Proceed {
                input,
                corrected_from: Some(original),
            } => {
                let corrected = prepare(table, &input).map_err(DispatchError::into_envelope)?;
                info!(
                    from = %self.policy.loggable(&original),
                    to = %self.policy.loggable(&input),
                    "running corrected command"
                );
                Ok(Approved {
                    stage: corrected,
                    corrected_from: Some(original),
                })
            }
            GateDecision::Rejected { reason } => Err(DispatchError::TierRejected {
                command: stage.descriptor.name().to_string(),
                reason,
            }
            .into_envelope()
            .with_meta(meta::TIER, tier.as_f64())),
        }
    }

    /// Execute an approved stage, optionally with piped input.
    pub(crate) async fn run(
        &self,
        approved: Approved,
        stdin: Option<Vec<u8>>,
        force: bool,
    ) -> ResultEnvelope {
        let Approved {
            stage,
            corrected_from,
        } = approved;
        let tier = stage.descriptor.tier();
        info!(command = %stage.descriptor.name(), %tier, "dispatching");

        let mut request = DispatchRequest::new(stage.descriptor, stage.args, stage.input);
        if let Some(bytes) = stdin {
            request = request.with_stdin(bytes);
        }
        let mut envelope = self.executor.execute(&request).await;

        let executed =
            envelope.meta.contains_key(meta::EXIT_CODE) || envelope.meta_bool(meta::TIMED_OUT);
        envelope.set_meta(meta::EXECUTED, executed);
        if let Some(original) = corrected_from {
            envelope.set_meta(meta::CORRECTED_FROM, original);
        }
        if force && tier == Tier::Lockdown {
            envelope.set_meta(meta::FORCED, true);
        }
        envelope
    }

    /// Queue counts and last successful sync, when remote routing is on.
    pub fn queue_summary(&self) -> Result<Option<QueueSummary>, QueueError> {
        match &self.remote {
            Some(remote) => remote.worker.queue().summary().map(Some),
            None => Ok(None),
        }
    }

    /// Run one sync cycle now.
    pub async fn force_sync(&self) -> Result<Option<CycleReport>, QueueError> {
        match &self.remote {
            Some(remote) => remote.worker.force_sync().await.map(Some),
            None => Ok(None),
        }
    }
}

/// Resolve and bind `text` against one registry snapshot.
pub(crate) fn prepare(table: &CommandTable, text: &str) -> Result<Stage, DispatchError> {
    let resolved = table.resolve(text)?;
    let args = bind(&resolved.descriptor, &resolved.arg_tail)?;
    Ok(Stage {
        descriptor: resolved.descriptor,
        args,
        input: text.trim().to_string(),
    })
}

/// A correction may only land on a command that binds and is no stricter
/// than the one typed.
fn correction_allowed(table: &CommandTable, tier: Tier, original: &str, candidate: &str) -> bool {
    match prepare(table, candidate) {
        Ok(stage) if stage.descriptor.tier() <= tier => true,
        Ok(stage) => {
            warn!(
                original,
                candidate,
                candidate_tier = %stage.descriptor.tier(),
                "ignoring correction to a stricter command"
            );
            false
        }
        Err(e) => {
            debug!(candidate, error = %e, "ignoring correction that does not resolve");
            false
        }
    }
}
