//! Interval-driven remote change poller.

use super::events::{diff, ChangeEvent, Fingerprint, FingerprintMap};
use super::source::{ChangeCallback, ChangeSource, Subscribers, Subscription};
use crate::error::{RemoteError, Result};
use crate::remote::{walk, RemoteConnection, WalkMode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct PollerInner {
    connection: Arc<RemoteConnection>,
    base: String,
    fingerprints: Mutex<FingerprintMap>,
    /// Bumped by `stop()` so a tick in flight cannot restore cleared state
    epoch: AtomicU64,
    subscribers: Arc<Subscribers>,
}

impl PollerInner {
    async fn snapshot(&self) -> Result<FingerprintMap> {
        let client = self.connection.client()?;
        let entries = walk(client.as_ref(), &self.base, WalkMode::Strict).await?;

        let mut map = FingerprintMap::new();
        for entry in entries {
            let fingerprint = if entry.is_dir {
                Fingerprint::Directory
            } else {
                let len = match entry.size {
                    Some(len) => len,
                    None => match client.read_file(&entry.path).await {
                        Ok(content) => content.len() as u64,
                        Err(RemoteError::NotFound(_)) => {
                            debug!(path = %entry.path, "File vanished after listing");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    },
                };
                Fingerprint::File { len }
            };
            map.insert(entry.path, fingerprint);
        }
        Ok(map)
    }

    async fn tick(&self) -> Result<Vec<ChangeEvent>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let current = self.snapshot().await?;

        let events = {
            let mut fingerprints = self.fingerprints.lock();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!("Discarding tick that raced with stop");
                return Ok(Vec::new());
            }
            let events = diff(&fingerprints, &current);
            *fingerprints = current;
            events
        };

        for event in &events {
            self.subscribers.emit(event);
        }
        if !events.is_empty() {
            debug!(events = events.len(), "Remote changes detected");
        }
        Ok(events)
    }
}

/// Lists the remote namespace on a fixed interval and reports what changed
pub struct RemotePoller {
    inner: Arc<PollerInner>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RemotePoller {
    pub fn new(connection: Arc<RemoteConnection>, base: &str, interval: Duration) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                connection,
                base: crate::tree::path::normalize_base(base),
                fingerprints: Mutex::new(FingerprintMap::new()),
                epoch: AtomicU64::new(0),
                subscribers: Subscribers::new(),
            }),
            interval,
            task: Mutex::new(None),
        }
    }

    /// Poll once and emit the resulting events.
    ///
    /// On failure the previous fingerprints are kept untouched.
    pub async fn tick(&self) -> Result<Vec<ChangeEvent>> {
        self.inner.tick().await
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    pub fn tracked_paths(&self) -> usize {
        self.inner.fingerprints.lock().len()
    }
}

impl ChangeSource for RemotePoller {
    fn subscribe(&self, callback: ChangeCallback) -> Subscription {
        self.inner.subscribers.add(callback)
    }

    /// Spawn the polling loop; the first tick runs one interval from now
    fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = inner.tick().await {
                    warn!(error = %e, "Poll tick failed; keeping previous snapshot");
                }
            }
        }));
        info!(base = %self.inner.base, interval_ms = period.as_millis() as u64, "Change poller started");
    }

    /// Cancel polling and forget every fingerprint
    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Change poller stopped");
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.fingerprints.lock().clear();
    }
}

impl Drop for RemotePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::remote::MemoryRemote;
    use crate::watch::ChangeKind;

    fn poller(remote: Arc<MemoryRemote>) -> RemotePoller {
        RemotePoller::new(
            Arc::new(RemoteConnection::connected(remote)),
            "/base",
            Duration::from_millis(2000),
        )
    }

    fn summary(events: &[ChangeEvent]) -> Vec<(ChangeKind, String)> {
        events.iter().map(|e| (e.kind, e.path.clone())).collect()
    }

    #[tokio::test]
    async fn test_file_deleted_between_list_and_read_is_absent() {
        let remote = Arc::new(MemoryRemote::with_base("/base").without_sizes());
        remote.put_file("/base/keep", "x");
        remote.put_file("/base/gone", "y");
        let poller = poller(Arc::clone(&remote));

        remote.vanish_on_read("/base/gone");
        let first = poller.tick().await.unwrap();
        assert_eq!(
            summary(&first),
            vec![(ChangeKind::Created, "/base/keep".to_string())]
        );

        let second = poller.tick().await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_file_emits_nothing_between_ticks() {
        let remote = Arc::new(MemoryRemote::with_base("/base"));
        remote.put_file("/base/a", "x");
        remote.put_file("/base/b", "y");
        let poller = poller(Arc::clone(&remote));

        let first = poller.tick().await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|e| e.kind == ChangeKind::Created));

        remote.remove("/base/b");
        remote.put_file("/base/c", "z");
        let second = poller.tick().await.unwrap();
        assert_eq!(
            summary(&second),
            vec![
                (ChangeKind::Created, "/base/c".to_string()),
                (ChangeKind::Deleted, "/base/b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_length_change_is_modified() {
        let remote = Arc::new(MemoryRemote::with_base("/base").without_sizes());
        remote.put_file("/base/a", "x");
        let poller = poller(Arc::clone(&remote));
        poller.tick().await.unwrap();

        remote.put_file("/base/a", "xyz");
        let events = poller.tick().await.unwrap();
        assert_eq!(summary(&events), vec![(ChangeKind::Modified, "/base/a".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_tick_keeps_previous_snapshot() {
        let remote = Arc::new(MemoryRemote::with_base("/base"));
        remote.put_file("/base/a", "x");
        let poller = poller(Arc::clone(&remote));
        poller.tick().await.unwrap();

        remote.set_fail_list(true);
        remote.put_file("/base/b", "y");
        assert!(matches!(poller.tick().await, Err(SyncError::Remote(_))));
        assert_eq!(poller.tracked_paths(), 1);

        remote.set_fail_list(false);
        let events = poller.tick().await.unwrap();
        assert_eq!(summary(&events), vec![(ChangeKind::Created, "/base/b".to_string())]);
    }

    #[tokio::test]
    async fn test_disconnected_tick_fails_without_panicking() {
        let poller = RemotePoller::new(
            Arc::new(RemoteConnection::new()),
            "/base",
            Duration::from_millis(2000),
        );
        assert!(matches!(
            poller.tick().await,
            Err(SyncError::RemoteUnavailable)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_on_interval_and_stop_resets_state() {
        let remote = Arc::new(MemoryRemote::with_base("/base"));
        remote.put_file("/base/a", "x");
        let poller = poller(Arc::clone(&remote));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = poller.subscribe(Arc::new(move |e: &ChangeEvent| {
            sink.lock().push(e.clone());
        }));

        poller.start();
        assert!(poller.is_running());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(seen.lock().is_empty());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(seen.lock().len(), 1);

        poller.stop();
        assert!(!poller.is_running());
        assert_eq!(poller.tracked_paths(), 0);

        // Restart treats every path as new once
        let events = poller.tick().await.unwrap();
        assert_eq!(summary(&events), vec![(ChangeKind::Created, "/base/a".to_string())]);

        subscription.unsubscribe();
        remote.put_file("/base/b", "y");
        poller.tick().await.unwrap();
        assert_eq!(seen.lock().len(), 2);
    }
}
