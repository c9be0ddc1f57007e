//! `isaac queue`: inspect and drive the offline queue.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use isaac_queue::{QueueStatus, QueueSummary, QueuedCommand};

use crate::context::{load_config, open_queue, remote_link, sync_worker};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Run the `isaac queue status` command.
pub fn status(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let queue = open_queue(&config)?;
    let summary = queue.summary().context("failed to read queue summary")?;

    println!("Queue: {}", config.queue_path.display());
    println!("{}", "-".repeat(40));
    print!("{}", format_summary(&summary));
    match &config.remote.endpoint {
        Some(endpoint) => println!("  Remote:       {endpoint}"),
        None => println!("  Remote:       not configured (always offline)"),
    }
    Ok(())
}

/// Run the `isaac queue list` command.
pub fn list(config_path: Option<&Path>, status: Option<&str>, limit: usize) -> Result<()> {
    let status = status
        .map(|s| s.parse::<QueueStatus>().map_err(anyhow::Error::msg))
        .transpose()?;
    let config = load_config(config_path)?;
    let entries = open_queue(&config)?
        .list(status, limit)
        .context("failed to list queue entries")?;

    if entries.is_empty() {
        println!("No queued commands.");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

/// Run the `isaac queue sync` command: one cycle, in the foreground.
pub async fn sync(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let queue = open_queue(&config)?;
    let worker = sync_worker(&config, queue, remote_link(&config)?, None)?;
    let report = worker.force_sync().await.context("sync cycle failed")?;

    if !report.reachable {
        println!("Remote unreachable; nothing delivered.");
    } else {
        println!(
            "Delivered {} of {} ({} failed).",
            report.synced, report.attempted, report.failed
        );
    }
    if report.reclaimed > 0 {
        println!("Recovered {} stale entr(y/ies).", report.reclaimed);
    }
    if report.purged > 0 {
        println!("Purged {} delivered entr(y/ies).", report.purged);
    }
    Ok(())
}

/// Run the `isaac queue retry` command.
pub fn retry(config_path: Option<&Path>, id: i64) -> Result<()> {
    let config = load_config(config_path)?;
    let queue = open_queue(&config)?;
    if queue.retry_failed(id).context("failed to update entry")? {
        println!("Entry #{id} is pending again.");
        return Ok(());
    }
    match queue.get(id).context("failed to read entry")? {
        Some(entry) => bail!("entry #{id} is {}, only failed entries can be retried", entry.status),
        None => bail!("no queue entry #{id}"),
    }
}

/// Run the `isaac queue purge` command.
pub fn purge(config_path: Option<&Path>, days: Option<u64>) -> Result<()> {
    let config = load_config(config_path)?;
    let horizon = match days {
        Some(days) => Duration::from_secs(days.saturating_mul(SECS_PER_DAY)),
        None => config.sync.retention(),
    };
    let deleted = open_queue(&config)?
        .purge_done(horizon)
        .context("failed to purge queue")?;
    println!("Purged {deleted} delivered entr(y/ies).");
    Ok(())
}

fn format_summary(summary: &QueueSummary) -> String {
    let last_sync = summary
        .last_sync
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".into());
    format!(
        "  Pending:      {}\n  Syncing:      {}\n  Failed:       {}\n  Done:         {}\n  Last sync:    {last_sync}\n",
        summary.pending, summary.syncing, summary.failed, summary.done
    )
}

fn format_entry(entry: &QueuedCommand) -> String {
    let target = entry.target_device.as_deref().unwrap_or("-");
    let mut line = format!(
        "#{:<5} {:<8} {:<12} {:<12} {}  {}",
        entry.id,
        entry.status.as_str(),
        entry.command_type.as_str(),
        target,
        entry.queued_at.format("%Y-%m-%d %H:%M:%S"),
        entry.command_text
    );
    if entry.retry_count > 0 {
        line.push_str(&format!("  (retries: {})", entry.retry_count));
    }
    if let Some(error) = &entry.error_message {
        line.push_str(&format!("\n        last error: {error}"));
    }
    line
}
