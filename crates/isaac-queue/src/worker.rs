//! Background sync worker.
//!
//! One long-lived task drains the durable queue whenever the remote link
//! is reachable. Each cycle reclaims stale claims, probes the link, then
//! delivers a FIFO batch. The sleep between cycles backs off exponentially
//! while online cycles keep failing, and resets after any success.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use isaac_policy::SecretRedactor;
use isaac_types::{QueueError, SyncConfig};

use crate::link::{Delivery, DeliveryError, RemoteLink};
use crate::store::{DurableQueue, QueuedCommand};

/// How often the retention sweep runs inside the loop.
const SWEEP_EVERY: Duration = Duration::from_secs(60 * 60);

/// Called with the number of entries delivered by a cycle.
pub type CompletionCallback = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub interval: Duration,
    pub max_interval: Duration,
    pub batch_size: usize,
    pub stale_after: Duration,
    pub retention: Duration,
    pub delivery_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            interval: config.interval(),
            max_interval: config.max_interval(),
            batch_size: config.batch_size,
            stale_after: config.stale_after(),
            retention: config.retention(),
            delivery_timeout: config.delivery_timeout(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub reachable: bool,
    /// Stale `syncing` entries returned to `pending`.
    pub reclaimed: usize,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// `done` entries removed by the retention sweep.
    pub purged: usize,
}

/// Sleep interval with exponential growth on failure.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    /// `min(base * 2^failures, max)`.
    pub fn delay(&self) -> Duration {
        let factor = 1u32 << self.failures.min(16);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Fold a cycle outcome in and return the next sleep.
    pub fn record(&mut self, report: &CycleReport) -> Duration {
        if !report.reachable {
            // Offline: keep probing at the base rate.
            return self.base;
        }
        if report.synced > 0 || report.attempted == 0 {
            self.failures = 0;
        } else {
            self.failures = self.failures.saturating_add(1);
        }
        self.delay()
    }

    pub fn record_error(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay()
    }
}

/// Drains the durable queue through a [`RemoteLink`].
pub struct SyncWorker {
    queue: Arc<DurableQueue>,
    link: Arc<dyn RemoteLink>,
    settings: SyncSettings,
    on_complete: Option<CompletionCallback>,
    redactor: SecretRedactor,
    last_sweep: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("queue", &self.queue)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SyncWorker {
    pub fn new(queue: Arc<DurableQueue>, link: Arc<dyn RemoteLink>, settings: SyncSettings) -> Self {
        Self {
            queue,
            link,
            settings,
            on_complete: None,
            redactor: SecretRedactor::new(),
            last_sweep: Mutex::new(None),
        }
    }

    /// Redactor for delivery errors recorded on failed entries.
    #[must_use]
    pub fn with_redactor(mut self, redactor: SecretRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    #[must_use]
    pub fn on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub fn queue(&self) -> &Arc<DurableQueue> {
        &self.queue
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one cycle now, ignoring any stop signal.
    pub async fn force_sync(&self) -> Result<CycleReport, QueueError> {
        info!("force sync requested");
        self.run_cycle(None).await
    }

    /// One sync cycle.
    ///
    /// With `stop` set, the flag is checked between entries; an entry whose
    /// delivery has started is always finished and recorded first.
    pub async fn run_cycle(
        &self,
        stop: Option<&watch::Receiver<bool>>,
    ) -> Result<CycleReport, QueueError> {
        let mut report = CycleReport {
            reclaimed: self.queue.reset_stale_syncing(self.settings.stale_after)?,
            purged: self.sweep_if_due()?,
            ..CycleReport::default()
        };

        if !self.link.is_reachable().await {
            debug!("remote unreachable, skipping sync");
            return Ok(report);
        }
        report.reachable = true;

        let batch = self.queue.dequeue_pending(self.settings.batch_size)?;
        for entry in batch {
            if stop.is_some_and(|rx| *rx.borrow()) {
                debug!("stop requested, ending batch early");
                break;
            }
            if !self.queue.mark_syncing(entry.id)? {
                // Claimed by a concurrent cycle.
                continue;
            }
            report.attempted += 1;
            match self.deliver(&entry).await {
                Ok(_) => {
                    if self.queue.mark_done(entry.id)? {
                        report.synced += 1;
                    }
                }
                Err(e) => {
                    let error = self.redactor.redact(&e.to_string());
                    self.queue.mark_failed(entry.id, &error)?;
                    report.failed += 1;
                }
            }
        }

        if report.synced > 0 {
            info!(count = report.synced, "synced queued commands");
            if let Some(callback) = &self.on_complete {
                callback(report.synced);
            }
        }
        Ok(report)
    }

    async fn deliver(&self, entry: &QueuedCommand) -> Result<String, DeliveryError> {
        let delivery = Delivery::from(entry);
        let timeout = self.settings.delivery_timeout;
        match tokio::time::timeout(timeout, self.link.deliver(&delivery)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        }
    }

    fn sweep_if_due(&self) -> Result<usize, QueueError> {
        let mut last = self.last_sweep.lock().map_err(|_| QueueError::Poisoned)?;
        if last.is_some_and(|at| at.elapsed() < SWEEP_EVERY) {
            return Ok(0);
        }
        *last = Some(Instant::now());
        drop(last);
        self.queue.purge_done(self.settings.retention)
    }

    /// Spawn the background loop.
    pub fn start(self: &Arc<Self>) -> SyncHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = Arc::clone(self);
        let join = tokio::spawn(async move { worker.run_loop(stop_rx).await });
        info!(interval_secs = self.settings.interval.as_secs(), "sync worker started");
        SyncHandle { stop_tx, join }
    }

    async fn run_loop(&self, mut stop: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.settings.interval, self.settings.max_interval);
        loop {
            if *stop.borrow() {
                break;
            }
            let wait = match self.run_cycle(Some(&stop)).await {
                Ok(report) => backoff.record(&report),
                Err(e) => {
                    error!(error = %e, "sync cycle failed");
                    backoff.record_error()
                }
            };
            if backoff.failures() > 0 {
                debug!(wait_secs = wait.as_secs(), failures = backoff.failures(), "backing off");
            }
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("sync worker stopped");
    }
}

/// Handle to a running sync loop.
#[derive(Debug)]
pub struct SyncHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SyncHandle {
    /// Signal the loop and wait up to `timeout` for the current cycle to
    /// finish. Returns `false` if the loop had to be aborted.
    pub async fn stop(mut self, timeout: Duration) -> bool {
        // The loop may already be gone, which is fine.
        let _ = self.stop_tx.send(true);
        match tokio::time::timeout(timeout, &mut self.join).await {
            Ok(_) => true,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "sync worker did not stop in time, aborting");
                self.join.abort();
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
