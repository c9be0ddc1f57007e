mod commands;
mod context;
mod prompt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// isaac -- a tiered-safety command shell with offline-durable remote routing.
#[derive(Parser, Debug)]
#[command(name = "isaac", version, about)]
struct Cli {
    /// Extra config file layered over the user and workspace configs
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch one line of input and exit
    Run {
        /// Pass a force override (Tier 4 still asks)
        #[arg(long)]
        force: bool,

        /// Print the full result envelope as JSON
        #[arg(long)]
        json: bool,

        /// Input line, e.g. `status`, `a | b`, or `!host cmd`
        #[arg(trailing_var_arg = true, required = true)]
        input: Vec<String>,
    },

    /// Interactive shell with background sync
    Shell,

    /// Command manifest subcommands
    Commands {
        #[command(subcommand)]
        action: CommandsAction,
    },

    /// Offline queue subcommands
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand, Debug)]
enum CommandsAction {
    /// List the commands the registry loads
    List,

    /// Validate every manifest under a directory
    Check {
        /// Directory of command subdirectories
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Show queue counts and the last successful sync
    Status,

    /// List queued entries, newest first
    List {
        /// Only entries with this status (pending, syncing, done, failed)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Run one sync cycle now
    Sync,

    /// Return a failed entry to pending
    Retry {
        /// Queue entry id
        id: i64,
    },

    /// Delete delivered entries older than the retention horizon
    Purge {
        /// Override the configured retention, in days
        #[arg(long)]
        days: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so envelopes on stdout stay parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run { force, json, input } => {
            let code = commands::run::run(config, &input.join(" "), force, json).await?;
            std::process::exit(code);
        }
        Commands::Shell => commands::shell::run(config).await,
        Commands::Commands { action } => match action {
            CommandsAction::List => commands::commands::list(config),
            CommandsAction::Check { dir } => commands::commands::check(&dir),
        },
        Commands::Queue { action } => match action {
            QueueAction::Status => commands::queue::status(config),
            QueueAction::List { status, limit } => {
                commands::queue::list(config, status.as_deref(), limit)
            }
            QueueAction::Sync => commands::queue::sync(config).await,
            QueueAction::Retry { id } => commands::queue::retry(config, id),
            QueueAction::Purge { days } => commands::queue::purge(config, days),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_run_joins_words() {
        let cli = Cli::try_parse_from(["isaac", "run", "--json", "git", "status"]);
        assert!(cli.is_ok(), "should parse run: {cli:?}");
        match cli.unwrap().command {
            Commands::Run { force, json, input } => {
                assert!(!force);
                assert!(json);
                assert_eq!(input, vec!["git", "status"]);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn cli_parse_run_keeps_remote_and_flags_in_input() {
        let cli = Cli::try_parse_from(["isaac", "run", "--force", "!labpc", "ls", "-la"]).unwrap();
        match cli.command {
            Commands::Run { force, input, .. } => {
                assert!(force);
                assert_eq!(input.join(" "), "!labpc ls -la");
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn cli_parse_queue_list_filters() {
        let cli =
            Cli::try_parse_from(["isaac", "queue", "list", "--status", "failed", "--limit", "5"])
                .unwrap();
        match cli.command {
            Commands::Queue {
                action: QueueAction::List { status, limit },
            } => {
                assert_eq!(status.as_deref(), Some("failed"));
                assert_eq!(limit, 5);
            }
            other => panic!("expected Queue List, got {other:?}"),
        }
    }

    #[test]
    fn cli_parse_global_config() {
        let cli = Cli::try_parse_from(["isaac", "queue", "status", "--config", "/tmp/x.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }

    #[test]
    fn cli_missing_required_args_fails() {
        assert!(Cli::try_parse_from(["isaac", "run"]).is_err());
        assert!(Cli::try_parse_from(["isaac", "queue", "retry"]).is_err());
        assert!(Cli::try_parse_from(["isaac", "commands", "check"]).is_err());
    }
}
