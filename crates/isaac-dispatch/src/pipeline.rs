//! Pipe chaining: `a | b | c`.
//!
//! Everything that can reject the pipeline happens before the first stage
//! runs: every stage resolves and binds, every stage after the first must
//! accept piped input, and every stage passes its tier gate. Only then do
//! the stages execute, each fed the previous stage's output.

use isaac_types::{meta, DispatchError, ResultEnvelope};
use tracing::{debug, info};

use crate::dispatcher::{prepare, Approved, DispatchOptions, Dispatcher};

impl Dispatcher {
    /// Run `stages` as a pipeline. A single stage runs like a plain command.
    pub async fn chain(&self, stages: &[String], options: DispatchOptions) -> ResultEnvelope {
        let table = self.registry().snapshot();

        let mut prepared = Vec::with_capacity(stages.len());
        for (i, text) in stages.iter().enumerate() {
            let text = text.trim();
            if text.is_empty() {
                return stage_error(
                    DispatchError::Validation {
                        field: "pipeline".into(),
                        message: "empty pipeline stage".into(),
                    },
                    i,
                );
            }
            if text.starts_with('!') {
                return stage_error(
                    DispatchError::Validation {
                        field: "pipeline".into(),
                        message: "remote commands cannot be piped".into(),
                    },
                    i,
                );
            }
            match prepare(&table, text) {
                Ok(stage) => prepared.push(stage),
                Err(e) => return stage_error(e, i),
            }
        }

        if let Some(err) = first_pipe_rejection(prepared.iter().map(|s| s.descriptor.as_ref())) {
            return err;
        }

        let mut approved: Vec<Approved> = Vec::with_capacity(prepared.len());
        for (i, stage) in prepared.into_iter().enumerate() {
            match self.approve(&table, stage, options.force) {
                Ok(a) => approved.push(a),
                Err(rejected) => {
                    info!(stage = i, "pipeline rejected before execution");
                    return rejected.with_meta(meta::STAGE, i);
                }
            }
        }
        // A correction may have swapped in a command that takes no input.
        if let Some(err) = first_pipe_rejection(approved.iter().map(|a| a.stage.descriptor.as_ref())) {
            return err;
        }

        let count = approved.len();
        let mut piped: Option<Vec<u8>> = None;
        let mut last = ResultEnvelope::text("");
        for (i, stage) in approved.into_iter().enumerate() {
            let envelope = self.run(stage, piped.take(), options.force).await;
            if !envelope.ok {
                debug!(stage = i, "pipeline stage failed, stopping");
                return envelope.with_meta(meta::STAGE, i).with_meta(meta::STAGES, count);
            }
            piped = Some(envelope.output.to_text().into_bytes());
            last = envelope;
        }
        last.with_meta(meta::STAGES, count)
    }
}

/// `PipeNotAccepted` for the first stage after the head that takes no input.
fn first_pipe_rejection<'a>(
    descriptors: impl Iterator<Item = &'a isaac_commands::CommandDescriptor>,
) -> Option<ResultEnvelope> {
    descriptors
        .enumerate()
        .skip(1)
        .find(|(_, d)| !d.accepts_stdin())
        .map(|(i, d)| {
            stage_error(
                DispatchError::PipeNotAccepted {
                    command: d.name().to_string(),
                },
                i,
            )
        })
}

fn stage_error(err: DispatchError, stage: usize) -> ResultEnvelope {
    err.into_envelope().with_meta(meta::STAGE, stage)
}
