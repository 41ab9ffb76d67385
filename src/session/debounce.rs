//! Resettable delay timer.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub type DebounceAction = Arc<dyn Fn() + Send + Sync>;

/// Runs `action` once `delay` has passed since the most recent `trigger()`.
///
/// Each trigger cancels the pending timer and starts a new one. Timers run
/// on the runtime the debouncer was created on, so `trigger()` may be
/// called from any thread.
pub struct Debouncer {
    delay: Duration,
    action: DebounceAction,
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
    fired: Arc<AtomicU64>,
}

impl Debouncer {
    /// Must be called from within a tokio runtime
    pub fn new(delay: Duration, action: DebounceAction) -> Self {
        Self {
            delay,
            action,
            runtime: Handle::current(),
            pending: Mutex::new(None),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn trigger(&self) {
        let delay = self.delay;
        let action = Arc::clone(&self.action);
        let fired = Arc::clone(&self.fired);
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            fired.fetch_add(1, Ordering::SeqCst);
            action();
        }));
    }

    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
