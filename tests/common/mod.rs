//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use isaac_commands::CommandRegistry;
use isaac_dispatch::Dispatcher;
use isaac_exec::{ExecutionEngine, ExecutorConfig};
use isaac_policy::{
    ConfirmRequest, Confirmer, Correction, CorrectionChoice, ExecutableAllowlist, PolicyEngine,
    SecretRedactor,
};
use isaac_queue::{
    CompletionCallback, Delivery, DeliveryError, DurableQueue, RemoteLink, RemoteRouter,
    SyncSettings, SyncWorker,
};

/// Confirmer with a fixed answer that records every request.
#[derive(Default)]
pub struct Recorder {
    answer: bool,
    requests: Mutex<Vec<ConfirmRequest>>,
}

impl Recorder {
    pub fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ConfirmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Confirmer for Recorder {
    fn notice(&self, _message: &str) {}

    fn confirm(&self, request: &ConfirmRequest) -> bool {
        self.requests.lock().unwrap().push(request.clone());
        self.answer
    }

    fn choose_correction(&self, _original: &str, _correction: &Correction) -> CorrectionChoice {
        CorrectionChoice::Abort
    }
}

/// Remote link whose reachability can be flipped mid-test.
#[derive(Default)]
pub struct SwitchLink {
    pub online: AtomicBool,
    pub delivered: Mutex<Vec<Delivery>>,
}

impl SwitchLink {
    pub fn offline() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteLink for SwitchLink {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<String, DeliveryError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(DeliveryError::Offline);
        }
        self.delivered.lock().unwrap().push(delivery.clone());
        Ok(format!("ran {}", delivery.command))
    }
}

/// Write one command directory under `root`. Scripts run with the command
/// directory as cwd, so `../../name` lands in the test's temp root.
pub fn write_command(root: &Path, name: &str, manifest_extra: &str, script: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("command.toml"),
        format!(
            "name = \"{name}\"\nversion = \"1.0.0\"\ntriggers = [\"{name}\"]\n{manifest_extra}\n[runtime]\nentry = \"run.sh\"\n"
        ),
    )
    .unwrap();
    let entry = dir.join("run.sh");
    std::fs::write(&entry, format!("#!/bin/bash\n{script}\n")).unwrap();
    std::fs::set_permissions(&entry, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// The standard command set used across the integration tests.
pub fn write_standard_commands(root: &Path) {
    write_command(root, "status", "tier = 1", "echo all systems nominal");
    write_command(root, "produce", "tier = 1", "touch ../../produced; echo hello world");
    write_command(root, "upper", "tier = 1\nstdin = true", "tr a-z A-Z");
    write_command(root, "count", "tier = 1", "echo 3");
    write_command(root, "wipe", "tier = 4", "touch ../../wiped; echo wiped");
    write_command(
        root,
        "spam",
        "tier = 1\n[resources]\ntimeout_ms = 500\nmax_output_kib = 1",
        "while true; do echo spam; done",
    );
}

pub struct Harness {
    pub tmp: TempDir,
    pub dispatcher: Dispatcher,
    pub confirmer: Arc<Recorder>,
    pub queue: Option<Arc<DurableQueue>>,
    pub completions: Arc<AtomicUsize>,
}

impl Harness {
    pub fn path(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    pub fn queue(&self) -> &Arc<DurableQueue> {
        self.queue.as_ref().expect("harness built without a queue")
    }
}

/// A dispatcher over the standard commands, without remote routing.
pub fn harness(confirmer: Arc<Recorder>) -> Harness {
    build(confirmer, None)
}

/// A dispatcher with remote routing over `link` and a queue in the temp root.
pub fn harness_with_remote(confirmer: Arc<Recorder>, link: Arc<dyn RemoteLink>) -> Harness {
    build(confirmer, Some(link))
}

fn build(confirmer: Arc<Recorder>, link: Option<Arc<dyn RemoteLink>>) -> Harness {
    let tmp = TempDir::new().unwrap();
    let commands = tmp.path().join("commands");
    write_standard_commands(&commands);

    let registry = Arc::new(CommandRegistry::new());
    let report = registry.load(&[commands]);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let policy = PolicyEngine::new(confirmer.clone());
    let executor = ExecutionEngine::new(
        ExecutorConfig::default(),
        ExecutableAllowlist::platform_default(),
        SecretRedactor::new(),
    );
    let mut dispatcher = Dispatcher::new(registry, policy, executor);

    let completions = Arc::new(AtomicUsize::new(0));
    let mut queue = None;
    if let Some(link) = link {
        let q = Arc::new(DurableQueue::open(&tmp.path().join("queue.db")).unwrap());
        let router = RemoteRouter::new(Arc::clone(&link), Arc::clone(&q), Duration::from_secs(1));
        let counter = Arc::clone(&completions);
        let callback: CompletionCallback = Arc::new(move |n: usize| {
            counter.fetch_add(n, Ordering::SeqCst);
        });
        let worker = SyncWorker::new(Arc::clone(&q), link, fast_settings()).on_complete(callback);
        dispatcher = dispatcher.with_remote(router, Arc::new(worker));
        queue = Some(q);
    }

    Harness {
        tmp,
        dispatcher,
        confirmer,
        queue,
        completions,
    }
}

/// Sync settings with short intervals for tests.
pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        interval: Duration::from_millis(50),
        max_interval: Duration::from_millis(400),
        delivery_timeout: Duration::from_secs(1),
        ..SyncSettings::default()
    }
}
