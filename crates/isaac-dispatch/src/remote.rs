//! `!target command`: gate locally, then route to another device.

use serde_json::{json, Map, Value};
use tracing::debug;

use isaac_commands::CommandTable;
use isaac_policy::GateDecision;
use isaac_types::{meta, DispatchError, QueueError, ResultEnvelope, Tier};

use crate::dispatcher::{DispatchOptions, Dispatcher};

/// Split `target command...` (without the leading `!`).
pub fn parse_remote(rest: &str) -> Result<(&str, &str), DispatchError> {
    let rest = rest.trim();
    let (target, command) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    let valid_target = !target.is_empty()
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid_target {
        return Err(DispatchError::Validation {
            field: "target".into(),
            message: format!("invalid remote target '{target}'"),
        });
    }
    if command.is_empty() {
        return Err(DispatchError::Validation {
            field: "command".into(),
            message: format!("nothing to send to '{target}'"),
        });
    }
    Ok((target, command))
}

/// Pieces of a remote shell line separated by `;`, `&&`, `||`, `|`, or `&`.
fn shell_segments(command: &str) -> impl Iterator<Item = &str> {
    command
        .split(|c| matches!(c, ';' | '|' | '&' | '\n'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

impl Dispatcher {
    pub(crate) async fn dispatch_remote(
        &self,
        rest: &str,
        options: DispatchOptions,
    ) -> Result<ResultEnvelope, QueueError> {
        match parse_remote(rest) {
            Ok((target, command)) => self.route(target, command, options).await,
            Err(e) => Ok(e.into_envelope()),
        }
    }

    /// Gate `command` at its local tier and send it to `target`.
    ///
    /// An unreachable target is not a failure: the command is queued and
    /// the envelope carries its queue id.
    pub async fn route(
        &self,
        target: &str,
        command: &str,
        options: DispatchOptions,
    ) -> Result<ResultEnvelope, QueueError> {
        let Some(remote) = &self.remote else {
            return Ok(DispatchError::DeliveryUnavailable {
                target: target.to_string(),
                reason: "remote routing is not configured".into(),
            }
            .into_envelope());
        };

        let table = self.registry().snapshot();
        let tier = self.remote_tier(&table, command);
        let accept = |candidate: &str| self.remote_tier(&table, candidate) <= tier;
        let (input, corrected_from) =
            match self.policy().gate_with(tier, command, options.force, &accept) {
                GateDecision::Proceed {
                    input,
                    corrected_from,
                } => (input, corrected_from),
                GateDecision::Rejected { reason } => {
                    return Ok(DispatchError::TierRejected {
                        command: command.to_string(),
                        reason,
                    }
                    .into_envelope()
                    .with_meta(meta::TIER, tier.as_f64())
                    .with_meta(meta::TARGET, target));
                }
            };

        let mut metadata = Map::new();
        metadata.insert(meta::TIER.into(), Value::from(tier.as_f64()));
        if tier >= Tier::Elevated {
            let report = self.policy().validate(&input);
            metadata.insert(
                "validation".into(),
                json!({
                    "safe": report.safe,
                    "warnings": report.warnings,
                    "suggestions": report.suggestions,
                }),
            );
        }
        if let Some(original) = &corrected_from {
            metadata.insert(meta::CORRECTED_FROM.into(), Value::from(original.as_str()));
        }

        debug!(target, command = %self.policy().loggable(&input), %tier, "routing remote command");
        let mut envelope = remote.router.route(target, &input, metadata).await?;
        envelope.set_meta(meta::TIER, tier.as_f64());
        if let Some(original) = corrected_from {
            envelope.set_meta(meta::CORRECTED_FROM, original);
        }
        if options.force && tier == Tier::Lockdown {
            envelope.set_meta(meta::FORCED, true);
        }
        Ok(envelope)
    }

    /// Highest tier across the shell segments of `command`.
    fn remote_tier(&self, table: &CommandTable, command: &str) -> Tier {
        shell_segments(command)
            .map(|segment| self.segment_tier(table, segment))
            .max()
            .unwrap_or_else(|| self.classifier.classify(command))
    }

    /// Manifest tier when the segment resolves here, else the default table.
    fn segment_tier(&self, table: &CommandTable, segment: &str) -> Tier {
        match table.resolve(segment) {
            Ok(resolved) => resolved.descriptor.tier(),
            Err(_) => self.classifier.classify(segment),
        }
    }
}
