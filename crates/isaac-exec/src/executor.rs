//! Command executor: runs a bound command as a child process.
//!
//! The executor launches the descriptor's entry point, feeds piped input
//! on stdin, captures both output streams up to the size cap, and kills the
//! whole process group when the timeout expires. It never checks tiers;
//! gating has already happened by the time a request gets here.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use isaac_commands::{BoundArgs, CommandDescriptor, OutputFormat};
use isaac_policy::{ExecutableAllowlist, SecretRedactor};
use isaac_types::{meta, DispatchError, ExecutionConfig, Output, ResultEnvelope};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::capture::{CaptureBuffer, Captured};
use crate::kill::terminate;

/// Environment variables never passed to a command.
const STRIPPED_ENV: &[&str] = &["LD_PRELOAD", "LD_LIBRARY_PATH", "LD_AUDIT"];
const STRIPPED_ENV_PREFIX: &str = "DYLD_";

/// One invocation, ready to run.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub descriptor: Arc<CommandDescriptor>,
    pub args: BoundArgs,
    /// Piped input from a previous pipeline stage.
    pub stdin: Option<Vec<u8>>,
    /// Remote device this request is addressed to, if any.
    pub target: Option<String>,
    /// The text the request was resolved from.
    pub input: String,
}

impl DispatchRequest {
    pub fn new(descriptor: Arc<CommandDescriptor>, args: BoundArgs, input: impl Into<String>) -> Self {
        Self {
            descriptor,
            args,
            stdin: None,
            target: None,
            input: input.into(),
        }
    }

    #[must_use]
    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }
}

/// Executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Used when the manifest sets no timeout.
    pub default_timeout: Duration,
    /// Used when the manifest sets no output cap.
    pub default_max_output_kib: u64,
    /// Cap on captured stderr.
    pub max_stderr_bytes: usize,
    /// Time between SIGTERM and SIGKILL on timeout.
    pub kill_grace: Duration,
    /// How long to wait for output readers once the child is gone.
    pub drain_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(5_000),
            default_max_output_kib: 64,
            max_stderr_bytes: 8 * 1024,
            kill_grace: Duration::from_millis(250),
            drain_timeout: Duration::from_secs(1),
        }
    }
}

impl From<&ExecutionConfig> for ExecutorConfig {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            default_max_output_kib: config.default_max_output_kib,
            ..Self::default()
        }
    }
}

/// Runs dispatch requests under resource limits.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    config: ExecutorConfig,
    allowlist: ExecutableAllowlist,
    redactor: SecretRedactor,
}

/// How the child finished.
enum Finish {
    Exited(ExitStatus),
    TimedOut,
    WaitFailed(std::io::Error),
}

impl ExecutionEngine {
    pub fn new(config: ExecutorConfig, allowlist: ExecutableAllowlist, redactor: SecretRedactor) -> Self {
        Self {
            config,
            allowlist,
            redactor,
        }
    }

    pub fn redactor(&self) -> &SecretRedactor {
        &self.redactor
    }

    /// Run `request` and normalize the outcome into an envelope.
    ///
    /// A non-zero exit is still `ok`; the code is in `exit_code` metadata.
    pub async fn execute(&self, request: &DispatchRequest) -> ResultEnvelope {
        let descriptor = &request.descriptor;
        let started = Instant::now();
        let mut envelope = match self.run(request).await {
            Ok(envelope) => envelope,
            Err(err) => err.into_envelope(),
        };
        envelope.set_meta(meta::COMMAND, descriptor.name());
        envelope.set_meta(meta::TIER, descriptor.tier().as_f64());
        envelope.set_meta(meta::DURATION_MS, elapsed_ms(started));
        envelope
    }

    async fn run(&self, request: &DispatchRequest) -> Result<ResultEnvelope, DispatchError> {
        let descriptor = &request.descriptor;
        let name = descriptor.name().to_string();
        let failed = |reason: String| DispatchError::ExecutionFailed {
            command: name.clone(),
            reason,
        };

        if request.stdin.is_some() && !descriptor.accepts_stdin() {
            return Err(DispatchError::PipeNotAccepted { command: name.clone() });
        }

        let entry = resolve_entry(descriptor).map_err(&failed)?;
        let (program, args) = resolve_program(descriptor, &entry);
        self.allowlist.check(&program)?;

        let redactor = self
            .redactor
            .extended(&descriptor.manifest().telemetry.redact_patterns)
            .map_err(&failed)?;
        let args_json = serde_json::to_string(&request.args)
            .map_err(|e| failed(format!("failed to serialize arguments: {e}")))?;

        let timeout = descriptor.timeout(self.config.default_timeout);
        let cap = descriptor.max_output_bytes(self.config.default_max_output_kib);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(descriptor.dir())
            .env("ISAAC_COMMAND", &name)
            .env("ISAAC_ARGS", &args_json)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in stripped_env_keys() {
            command.env_remove(key);
        }
        #[cfg(unix)]
        command.process_group(0);

        debug!(command = %name, program = %program, timeout_ms = timeout.as_millis() as u64, "spawning command");
        let mut child = command
            .spawn()
            .map_err(|e| failed(format!("failed to spawn {program}: {e}")))?;

        if let (Some(mut stdin), Some(bytes)) = (child.stdin.take(), request.stdin.clone()) {
            tokio::spawn(async move {
                // A child that exits without reading closes the pipe early.
                if let Err(e) = stdin.write_all(&bytes).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        debug!(error = %e, "failed writing piped input");
                    }
                }
            });
        }

        let stdout_buf = CaptureBuffer::new(cap);
        let stderr_buf = CaptureBuffer::new(self.config.max_stderr_bytes);
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            let buf = stdout_buf.clone();
            readers.push(tokio::spawn(async move { buf.fill(out).await }));
        }
        if let Some(err) = child.stderr.take() {
            let buf = stderr_buf.clone();
            readers.push(tokio::spawn(async move { buf.fill(err).await }));
        }

        let finish = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => Finish::Exited(status),
            Ok(Err(e)) => Finish::WaitFailed(e),
            Err(_) => {
                warn!(command = %name, timeout_ms = timeout.as_millis() as u64, "command timed out, terminating");
                terminate(&mut child, self.config.kill_grace).await;
                Finish::TimedOut
            }
        };

        for reader in readers {
            match tokio::time::timeout(self.config.drain_timeout, reader).await {
                Ok(_) => {}
                Err(_) => debug!(command = %name, "output reader still open, using partial output"),
            }
        }
        let stdout = stdout_buf.snapshot();
        let stderr = stderr_buf.snapshot();
        let timed_out = matches!(finish, Finish::TimedOut);

        let mut envelope = match finish {
            Finish::Exited(status) => {
                let mut envelope = ResultEnvelope::success(Output::Empty);
                envelope.set_meta(meta::EXIT_CODE, status.code());
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    if let Some(signal) = status.signal() {
                        envelope.set_meta(meta::SIGNAL, signal);
                    }
                }
                info!(command = %name, exit_code = ?status.code(), truncated = stdout.truncated, "command finished");
                envelope
            }
            Finish::TimedOut => DispatchError::ExecutionTimeout {
                command: name.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into_envelope(),
            Finish::WaitFailed(e) => failed(format!("failed to wait for process: {e}")).into_envelope(),
        };

        envelope.output = render_output(descriptor.manifest().output, &stdout, &redactor);
        envelope.set_meta(meta::TRUNCATED, stdout.truncated);
        envelope.set_meta(meta::TIMED_OUT, timed_out);
        if !stderr.bytes.is_empty() {
            let text = redactor.redact(&String::from_utf8_lossy(&stderr.bytes));
            envelope.set_meta(meta::STDERR, text);
        }
        Ok(envelope)
    }
}

/// Parse (when asked for JSON) and redact captured stdout.
fn render_output(format: OutputFormat, stdout: &Captured, redactor: &SecretRedactor) -> Output {
    if stdout.bytes.is_empty() {
        return Output::Empty;
    }
    let text = redactor.redact(&String::from_utf8_lossy(&stdout.bytes));
    if format == OutputFormat::Json && !stdout.truncated {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            return Output::Json(value);
        }
    }
    Output::Text(text)
}

/// Entry point path, checked to exist inside the command directory.
fn resolve_entry(descriptor: &CommandDescriptor) -> Result<PathBuf, String> {
    let entry = descriptor.entry_path();
    if !entry.is_file() {
        return Err(format!("entry point does not exist: {}", entry.display()));
    }
    let dir = descriptor
        .dir()
        .canonicalize()
        .map_err(|e| format!("failed to resolve command dir {}: {e}", descriptor.dir().display()))?;
    let canonical = entry
        .canonicalize()
        .map_err(|e| format!("failed to resolve entry point {}: {e}", entry.display()))?;
    if !canonical.starts_with(&dir) {
        return Err(format!("entry point escapes command directory: {}", entry.display()));
    }
    Ok(canonical)
}

/// Program and arguments for an entry point.
///
/// An explicit interpreter wins; otherwise the file extension decides, and
/// anything unrecognized runs directly.
pub fn resolve_program(descriptor: &CommandDescriptor, entry: &Path) -> (String, Vec<String>) {
    let entry_arg = entry.to_string_lossy().into_owned();
    if let Some(interpreter) = &descriptor.manifest().runtime.interpreter {
        return (interpreter.clone(), vec![entry_arg]);
    }
    let ext = entry.extension().and_then(|e| e.to_str()).unwrap_or("");
    let interpreter = match ext {
        "sh" | "bash" => Some("bash"),
        "py" => Some("python3"),
        "js" | "mjs" => Some("node"),
        "rb" => Some("ruby"),
        "pl" => Some("perl"),
        "ps1" => Some("pwsh"),
        _ => None,
    };
    match interpreter {
        Some(program) => (program.to_string(), vec![entry_arg]),
        None => (entry_arg, Vec::new()),
    }
}

fn stripped_env_keys() -> Vec<String> {
    let mut keys: Vec<String> = STRIPPED_ENV.iter().map(|k| k.to_string()).collect();
    keys.extend(
        std::env::vars_os()
            .filter_map(|(k, _)| k.into_string().ok())
            .filter(|k| k.starts_with(STRIPPED_ENV_PREFIX)),
    );
    keys
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
