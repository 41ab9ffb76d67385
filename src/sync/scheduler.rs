//! Coalescing pull scheduler.
//!
//! Prompt debouncers and change sources call `request()` freely; requests
//! landing within one coalescing window collapse into a single
//! `sync_now()`. The worker can be stopped and started again across
//! reconnects.

use super::SyncEngine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct PullScheduler {
    engine: Arc<SyncEngine>,
    window: Duration,
    tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    completed: Arc<AtomicU64>,
}

impl PullScheduler {
    /// Create a stopped scheduler; requests are ignored until `start()`
    pub fn new(engine: Arc<SyncEngine>, window: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            window,
            tx: Mutex::new(None),
            worker: Mutex::new(None),
            completed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Spawn the worker on the current tokio runtime. No-op when running.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let engine = Arc::clone(&self.engine);
        let window = self.window;
        let counter = Arc::clone(&self.completed);

        *worker = Some(tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(window).await;
                let mut coalesced = 1;
                while rx.try_recv().is_ok() {
                    coalesced += 1;
                }
                debug!(coalesced, "Running scheduled pull");
                match engine.sync_now().await {
                    Ok(report) => info!(
                        inserted = report.inserted,
                        updated = report.updated,
                        "Scheduled pull merged"
                    ),
                    Err(e) => warn!(error = %e, "Scheduled pull failed"),
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        *self.tx.lock() = Some(tx);
        info!(window_ms = window.as_millis() as u64, "Pull scheduler started");
    }

    /// Ask for a pull; never blocks
    pub fn request(&self) {
        match self.tx.lock().as_ref() {
            Some(tx) if tx.send(()).is_ok() => {}
            _ => debug!("Pull requested while scheduler is stopped"),
        }
    }

    /// Number of pulls the worker has run, successful or not
    pub fn completed_pulls(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn shutdown(&self) {
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
            info!("Pull scheduler stopped");
        }
    }
}

impl Drop for PullScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
