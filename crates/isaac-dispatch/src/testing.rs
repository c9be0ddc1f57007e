//! Shared fixtures for dispatcher unit tests.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use isaac_commands::CommandRegistry;
use isaac_exec::{ExecutionEngine, ExecutorConfig};
use isaac_policy::{
    ConfirmRequest, Confirmer, Correction, CorrectionChoice, Corrector, ExecutableAllowlist,
    PolicyEngine, SecretRedactor,
};
use isaac_queue::{DurableQueue, RemoteLink, RemoteRouter, SyncSettings, SyncWorker};
use tempfile::TempDir;

use crate::Dispatcher;

/// Confirmer with a fixed answer that records every prompt.
#[derive(Default)]
pub struct Scripted {
    answer: bool,
    choice: Option<CorrectionChoice>,
    prompts: Mutex<Vec<ConfirmRequest>>,
    notices: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            ..Default::default()
        })
    }

    pub fn choosing(choice: CorrectionChoice) -> Arc<Self> {
        Arc::new(Self {
            answer: true,
            choice: Some(choice),
            ..Default::default()
        })
    }

    pub fn prompts(&self) -> Vec<ConfirmRequest> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Confirmer for Scripted {
    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn confirm(&self, request: &ConfirmRequest) -> bool {
        self.prompts.lock().unwrap().push(request.clone());
        self.answer
    }

    fn choose_correction(&self, original: &str, correction: &Correction) -> CorrectionChoice {
        self.prompts.lock().unwrap().push(ConfirmRequest {
            command: format!("{original} -> {}", correction.corrected),
            tier: isaac_types::Tier::CorrectConfirm,
            report: None,
            strict: false,
            forced: false,
        });
        self.choice.unwrap_or(CorrectionChoice::Abort)
    }
}

/// Corrector backed by an exact-input table.
#[derive(Default)]
pub struct TableCorrector {
    table: Mutex<HashMap<String, Correction>>,
}

impl Corrector for TableCorrector {
    fn suggest(&self, input: &str) -> Option<Correction> {
        self.table.lock().unwrap().get(input).cloned()
    }
}

pub struct Fixture {
    pub tmp: TempDir,
    pub dispatcher: Dispatcher,
    pub confirmer: Arc<Scripted>,
    pub corrector: Arc<TableCorrector>,
    pub queue: Option<Arc<DurableQueue>>,
}

impl Fixture {
    /// Where command scripts drop marker files.
    pub fn marker(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    pub fn executor(&self) -> ExecutionEngine {
        engine()
    }

    #[must_use]
    pub fn with_correction(self, input: &str, correction: Correction) -> Self {
        self.corrector
            .table
            .lock()
            .unwrap()
            .insert(input.to_string(), correction);
        self
    }
}

/// Write one command directory. Scripts run with the command directory as
/// cwd, so `../../x` lands in the fixture root.
pub fn write_command(root: &Path, name: &str, manifest_extra: &str, script: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("command.toml"),
        format!(
            "name = \"{name}\"\nversion = \"1.0.0\"\n{manifest_extra}\n[runtime]\nentry = \"run.sh\"\n"
        ),
    )
    .unwrap();
    let entry = dir.join("run.sh");
    std::fs::write(&entry, format!("#!/bin/bash\n{script}\n")).unwrap();
    std::fs::set_permissions(&entry, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn write_commands(root: &Path) {
    write_command(
        root,
        "status",
        "triggers = [\"status\"]\ntier = 1",
        "echo all systems nominal",
    );
    write_command(root, "stat", "triggers = [\"/stat\"]\ntier = 2", "echo stat");
    write_command(
        root,
        "delete",
        "triggers = [\"delete\"]\ntier = 4\n[[args]]\nname = \"path\"\ntype = \"string\"\nrequired = true",
        "touch ../../deleted",
    );
    write_command(
        root,
        "produce",
        "triggers = [\"produce\"]\ntier = 1",
        "touch ../../produced; echo hello world",
    );
    write_command(
        root,
        "upper",
        "triggers = [\"upper\"]\ntier = 1\nstdin = true",
        "tr a-z A-Z",
    );
    write_command(
        root,
        "lines",
        "triggers = [\"lines\"]\ntier = 1",
        "echo one; echo two",
    );
    write_command(
        root,
        "guarded",
        "triggers = [\"guarded\"]\ntier = 3\nstdin = true",
        "cat",
    );
    write_command(root, "broken", "triggers = [\"broken\"]\ntier = 1\n[resources]\ntimeout_ms = 200", "sleep 5");
}

fn engine() -> ExecutionEngine {
    ExecutionEngine::new(
        ExecutorConfig::default(),
        ExecutableAllowlist::platform_default(),
        SecretRedactor::new(),
    )
}

fn build(confirmer: Arc<Scripted>, remote: Option<Arc<dyn RemoteLink>>) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let commands = tmp.path().join("commands");
    std::fs::create_dir_all(&commands).unwrap();
    write_commands(&commands);

    let registry = Arc::new(CommandRegistry::new());
    let report = registry.load(&[commands]);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let corrector = Arc::new(TableCorrector::default());
    let policy = PolicyEngine::new(confirmer.clone()).with_corrector(corrector.clone());
    let mut dispatcher = Dispatcher::new(registry, policy, engine());

    let mut queue = None;
    if let Some(link) = remote {
        let q = Arc::new(DurableQueue::open(&tmp.path().join("queue.db")).unwrap());
        let router = RemoteRouter::new(Arc::clone(&link), Arc::clone(&q), Duration::from_secs(1));
        let worker = Arc::new(SyncWorker::new(Arc::clone(&q), link, SyncSettings::default()));
        dispatcher = dispatcher.with_remote(router, worker);
        queue = Some(q);
    }

    Fixture {
        tmp,
        dispatcher,
        confirmer,
        corrector,
        queue,
    }
}

pub fn fixture(confirmer: Arc<Scripted>) -> Fixture {
    build(confirmer, None)
}

pub fn fixture_with_remote(confirmer: Arc<Scripted>, link: Arc<dyn RemoteLink>) -> Fixture {
    build(confirmer, Some(link))
}
