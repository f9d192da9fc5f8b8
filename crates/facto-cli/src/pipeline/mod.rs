//! Ingestion pipeline: watch the inbox, dispatch workers, route outcomes.
//!
//! The event loop ticks every `poll_interval_ms`. Each tick checks that the
//! inbox is reachable, runs the periodic rescan when due and hands pending
//! paths to workers while a slot is free. The work queue is the only state
//! shared with the watcher thread.

pub mod outcome;
pub mod queue;
pub mod readiness;
pub mod watcher;
pub mod worker;

pub use outcome::{move_to_folder, Destination, OutcomeFolders};
pub use queue::WorkQueue;
pub use readiness::{wait_for_file_ready, Readiness, ReadinessPolicy};
pub use watcher::{scan_existing, DirectoryWatcher};
pub use worker::{FileOutcome, InvoiceWorker, Stage};

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use facto_core::models::config::WatchConfig;
use facto_core::FactoConfig;
use facto_ledger::LedgerBackend;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Counts of routed files for one run.
#[derive(Debug, Default)]
struct Counters {
    sent: AtomicUsize,
    posted: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: &FileOutcome) {
        let counter = match outcome.destination() {
            Some(Destination::Sent) => &self.sent,
            Some(Destination::Posted) => &self.posted,
            Some(Destination::Error) => &self.failed,
            None => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            sent: self.sent.load(Ordering::Relaxed),
            posted: self.posted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Files routed during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub sent: usize,
    pub posted: usize,
    pub failed: usize,
}

/// Watch loop state.
enum Monitor {
    /// Not started yet or the inbox went away; retry at the given instant.
    Offline { retry_at: Instant },
    Running { _watcher: DirectoryWatcher, last_scan: Instant },
}

pub struct Pipeline {
    config: WatchConfig,
    queue: Arc<WorkQueue>,
    worker: InvoiceWorker,
    counters: Arc<Counters>,
}

impl Pipeline {
    pub fn new(config: &FactoConfig, backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            config: config.watch.clone(),
            queue: Arc::new(WorkQueue::new()),
            worker: InvoiceWorker::new(config, backend),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    /// Enqueue every PDF already in the inbox. Returns how many were new.
    pub fn rescan(&self) -> std::io::Result<usize> {
        let mut added = 0;
        for path in scan_existing(&self.config.input_dir)? {
            if self.queue.push(path) {
                added += 1;
            }
        }
        if added > 0 {
            info!("Queued {} existing PDF files", added);
        }
        Ok(added)
    }

    /// Scan, then watch the inbox.
    fn start_monitoring(&self) -> anyhow::Result<Monitor> {
        info!("Scanning {} for existing PDF files", self.config.input_dir.display());
        self.rescan()?;
        let watcher = DirectoryWatcher::start(
            &self.config.input_dir,
            self.config.watcher,
            Duration::from_millis(self.config.poll_interval_ms.max(1)),
            self.queue.clone(),
        )?;
        info!("Monitoring started");
        Ok(Monitor::Running {
            _watcher: watcher,
            last_scan: Instant::now(),
        })
    }

    fn offline(&self) -> Monitor {
        Monitor::Offline {
            retry_at: Instant::now() + Duration::from_secs(self.config.reconnect_interval_secs),
        }
    }

    /// Run until `shutdown` resolves, then wait for in-flight workers.
    pub async fn run<F>(&self, shutdown: F) -> anyhow::Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        self.worker.folders().ensure()?;

        let slots = self.config.max_workers.max(1);
        let semaphore = Arc::new(Semaphore::new(slots));
        let rescan_every = Duration::from_secs(self.config.rescan_interval_secs);

        let mut tick = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut monitor = Monitor::Offline { retry_at: Instant::now() };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tick.tick() => {}
            }

            let reachable = self.config.input_dir.is_dir();
            monitor = match monitor {
                Monitor::Running { .. } if !reachable => {
                    error!(
                        "Watched folder {} unreachable, retrying in {}s",
                        self.config.input_dir.display(),
                        self.config.reconnect_interval_secs
                    );
                    self.offline()
                }
                Monitor::Offline { retry_at } if Instant::now() >= retry_at => {
                    if !reachable {
                        error!("Watched folder {} unreachable", self.config.input_dir.display());
                        self.offline()
                    } else {
                        match self.start_monitoring() {
                            Ok(running) => running,
                            Err(e) => {
                                error!("Failed to start monitoring: {}", e);
                                self.offline()
                            }
                        }
                    }
                }
                Monitor::Running { _watcher, last_scan } if last_scan.elapsed() >= rescan_every => {
                    info!("Running periodic scan");
                    if let Err(e) = self.rescan() {
                        warn!("Periodic scan failed: {}", e);
                    }
                    Monitor::Running {
                        _watcher,
                        last_scan: Instant::now(),
                    }
                }
                other => other,
            };

            if matches!(monitor, Monitor::Offline { .. }) {
                continue;
            }
            self.dispatch(&semaphore);
        }

        drop(monitor);
        info!("Monitoring stopped");

        if semaphore.available_permits() < slots {
            info!("Waiting for {} running worker(s)", slots - semaphore.available_permits());
        }
        let _drained = semaphore.acquire_many(slots as u32).await?;

        let summary = self.counters.summary();
        info!(sent = summary.sent, posted = summary.posted, failed = summary.failed, "Pipeline stopped");
        Ok(summary)
    }

    /// Start a worker for each pending path while a slot is free.
    fn dispatch(&self, semaphore: &Arc<Semaphore>) {
        while let Ok(permit) = semaphore.clone().try_acquire_owned() {
            let Some(path) = self.queue.try_pop() else {
                break;
            };
            debug!("Dispatching {}", path.display());

            let worker = self.worker.clone();
            let queue = self.queue.clone();
            let counters = self.counters.clone();
            tokio::spawn(async move {
                let outcome = worker.process(&path).await;
                counters.record(&outcome);
                queue.complete(&path);
                drop(permit);
            });
        }
    }
}
