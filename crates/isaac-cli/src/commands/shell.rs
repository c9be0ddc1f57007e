//! `isaac shell`: the interactive loop.
//!
//! The sync worker runs in the background for the lifetime of the shell
//! and prints a line whenever it delivers queued commands. Manifests are
//! re-scanned before each prompt.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, warn};

use isaac_commands::ManifestWatcher;
use isaac_dispatch::{DispatchOptions, Dispatcher};
use isaac_queue::{CompletionCallback, QueueSummary};

use crate::commands::render;
use crate::context::{build_dispatcher, load_config, load_registry, reload};

const HELP: &str = "\
Built-ins:
  /sync            deliver queued commands now
  /queue           show queue counts
  /force <input>   dispatch with a force override (Tier 4 still asks)
  help             this text
  exit, quit       leave the shell
Anything else is dispatched: `cmd args`, `a | b`, or `!host cmd`.";

/// A line the shell handles itself instead of dispatching.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Empty,
    Exit,
    Help,
    Sync,
    Queue,
    Dispatch { input: &'a str, force: bool },
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    match line {
        "" => Line::Empty,
        "exit" | "quit" => Line::Exit,
        "help" | "/help" => Line::Help,
        "/sync" => Line::Sync,
        "/queue" => Line::Queue,
        _ => match line.strip_prefix("/force ") {
            Some(rest) => Line::Dispatch {
                input: rest.trim(),
                force: true,
            },
            None => Line::Dispatch {
                input: line,
                force: false,
            },
        },
    }
}

/// Prompt prefix shown while anything is waiting for delivery.
fn indicator(summary: Option<&QueueSummary>) -> String {
    match summary.map(QueueSummary::outstanding) {
        Some(n) if n > 0 => format!("[offline, {n} queued] "),
        _ => String::new(),
    }
}

/// Run the `isaac shell` command.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = load_registry(&config);
    let on_complete: CompletionCallback = Arc::new(|n: usize| {
        eprintln!("\n[sync] delivered {n} queued command(s)");
    });
    let dispatcher = build_dispatcher(&config, Arc::clone(&registry), Some(on_complete))?;
    let handle = dispatcher.sync_worker().map(|worker| worker.start());
    let mut watcher = ManifestWatcher::new(config.command_dirs.clone());

    println!(
        "isaac shell: {} command(s) loaded. Type 'help' for built-ins.",
        registry.snapshot().len()
    );

    loop {
        if !watcher.poll_changes().is_empty() {
            let count = reload(&registry, &config);
            eprintln!("reloaded commands ({count} loaded)");
        }

        let summary = match dispatcher.queue_summary() {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "could not read queue summary");
                None
            }
        };
        print!("{}isaac> ", indicator(summary.as_ref()));
        std::io::stdout().flush().context("failed to write prompt")?;

        let Some(line) = read_line().await? else {
            println!();
            break;
        };
        match classify(&line) {
            Line::Empty => {}
            Line::Exit => break,
            Line::Help => println!("{HELP}"),
            Line::Sync => sync_now(&dispatcher).await,
            Line::Queue => match summary {
                Some(s) => println!(
                    "pending {}, syncing {}, failed {}, done {}",
                    s.pending, s.syncing, s.failed, s.done
                ),
                None => println!("remote routing is not configured"),
            },
            Line::Dispatch { input, force } => dispatch(&dispatcher, input, force).await,
        }
    }

    if let Some(handle) = handle {
        if !handle.stop(config.sync.stop_timeout()).await {
            eprintln!("sync worker was stopped mid-cycle; in-flight entries will be recovered");
        }
    }
    Ok(())
}

async fn dispatch(dispatcher: &Dispatcher, input: &str, force: bool) {
    match dispatcher.dispatch(input, DispatchOptions { force }).await {
        Ok(envelope) => {
            let (out, err) = render(&envelope);
            if !out.is_empty() {
                print!("{out}");
                if !out.ends_with('\n') {
                    println!();
                }
            }
            if !err.is_empty() {
                eprintln!("{err}");
            }
        }
        Err(e) => {
            error!(error = %e, "command could not be recorded");
            eprintln!("error: {e}; the command was NOT queued");
        }
    }
}

async fn sync_now(dispatcher: &Dispatcher) {
    match dispatcher.force_sync().await {
        Ok(Some(report)) if !report.reachable => println!("remote unreachable"),
        Ok(Some(report)) => println!(
            "delivered {} of {} ({} failed)",
            report.synced, report.attempted, report.failed
        ),
        Ok(None) => println!("remote routing is not configured"),
        Err(e) => eprintln!("sync failed: {e}"),
    }
}

/// One line from stdin, `None` at end of input.
async fn read_line() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(e) => Err(e),
        }
    })
    .await
    .context("input reader stopped")?
    .context("failed to read input")
}
