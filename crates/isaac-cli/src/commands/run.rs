use std::path::Path;

use anyhow::{Context, Result};

use isaac_dispatch::DispatchOptions;

use crate::commands::{exit_code, render};
use crate::context::{build_dispatcher, load_config, load_registry};

/// Run the `isaac run` command.
///
/// Prints the output (or the whole envelope with `--json`) and returns the
/// process exit status.
pub async fn run(config_path: Option<&Path>, input: &str, force: bool, json: bool) -> Result<i32> {
    let config = load_config(config_path)?;
    let registry = load_registry(&config);
    let dispatcher = build_dispatcher(&config, registry, None)?;

    let envelope = dispatcher
        .dispatch(input, DispatchOptions { force })
        .await
        .context("command could not be recorded")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).context("failed to serialize result")?
        );
    } else {
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
    Ok(exit_code(&envelope))
}
