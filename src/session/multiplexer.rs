//! Multiplexes N terminal sessions over the remote PTY capability.

use super::debounce::Debouncer;
use super::prompt::PromptDetector;
use super::surface::DisplaySurface;
use crate::config::SessionsConfig;
use crate::error::{Result, SyncError};
use crate::remote::{OutputSink, RemoteConnection, SessionHandle};
use crate::sync::{MergeReport, PullScheduler, SyncEngine};
use crate::types::{IdMinter, SessionId};
use crate::workspace::SessionRow;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Ready,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Initializing => f.write_str("initializing"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Read-only view of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub display_name: String,
    pub state: SessionState,
    pub handle: Option<SessionHandle>,
}

struct SessionEntry {
    id: SessionId,
    display_name: String,
    state: SessionState,
    handle: Option<SessionHandle>,
    surface: Option<Arc<dyn DisplaySurface>>,
    debouncer: Arc<Debouncer>,
}

struct Inner {
    connection: Arc<RemoteConnection>,
    engine: Arc<SyncEngine>,
    scheduler: Arc<PullScheduler>,
    detector: PromptDetector,
    debounce: Duration,
    /// Creation order; the last entry is the most recently created
    sessions: Mutex<Vec<SessionEntry>>,
    active: Mutex<Option<SessionId>>,
    auto_sync: AtomicBool,
    minter: IdMinter,
    prompt_matches: AtomicU64,
}

impl Inner {
    fn on_output(&self, id: &SessionId, bytes: &[u8]) {
        let routed = {
            let sessions = self.sessions.lock();
            sessions
                .iter()
                .find(|s| &s.id == id)
                .map(|s| (s.surface.clone(), Arc::clone(&s.debouncer)))
        };
        let Some((surface, debouncer)) = routed else {
            debug!(session = %id, bytes = bytes.len(), "Dropping output for closed session");
            return;
        };

        if let Some(surface) = surface {
            surface.write(bytes);
        }
        if self.detector.is_match(bytes) {
            self.prompt_matches.fetch_add(1, Ordering::Relaxed);
            if self.auto_sync.load(Ordering::SeqCst) {
                debouncer.trigger();
            }
        }
    }

    /// Mark the session failed and unbind its surface so `attach` can be retried
    fn fail_attach(&self, id: &SessionId, error: &SyncError) {
        if let Some(entry) = self.sessions.lock().iter_mut().find(|s| &s.id == id) {
            entry.state = SessionState::Failed(error.to_string());
            entry.surface = None;
        }
    }

    fn handle_of(&self, id: &SessionId) -> Result<SessionHandle> {
        let sessions = self.sessions.lock();
        let entry = sessions
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| SyncError::SessionNotFound(id.clone()))?;
        match (&entry.state, entry.handle) {
            (SessionState::Ready, Some(handle)) => Ok(handle),
            (state, _) => Err(SyncError::InvalidOperation(format!(
                "session {} is {}",
                id, state
            ))),
        }
    }
}

/// Owns every terminal session and routes bytes in both directions.
///
/// Output for a session flows into its display surface and through the
/// prompt heuristic; each session debounces its own prompt matches and
/// hands expiries to the shared pull scheduler.
pub struct SessionMultiplexer {
    inner: Arc<Inner>,
}

impl SessionMultiplexer {
    pub fn new(
        connection: Arc<RemoteConnection>,
        engine: Arc<SyncEngine>,
        scheduler: Arc<PullScheduler>,
        settings: &SessionsConfig,
    ) -> Result<Self> {
        let detector = PromptDetector::new(&settings.extra_prompt_patterns)?;
        Ok(Self {
            inner: Arc::new(Inner {
                connection,
                engine,
                scheduler,
                detector,
                debounce: settings.debounce(),
                sessions: Mutex::new(Vec::new()),
                active: Mutex::new(None),
                auto_sync: AtomicBool::new(settings.auto_sync),
                minter: IdMinter::new("term-"),
                prompt_matches: AtomicU64::new(0),
            }),
        })
    }

    /// Allocate an initializing session and make it active.
    ///
    /// Must be called within a tokio runtime; the PTY is spawned by `attach`.
    pub fn create_session(&self) -> SessionId {
        let (id, ordinal) = self.inner.minter.mint_session();
        let scheduler = Arc::clone(&self.inner.scheduler);
        let debouncer = Debouncer::new(
            self.inner.debounce,
            Arc::new(move || scheduler.request()),
        );
        let entry = SessionEntry {
            id: id.clone(),
            display_name: format!("Terminal {}", ordinal),
            state: SessionState::Initializing,
            handle: None,
            surface: None,
            debouncer: Arc::new(debouncer),
        };
        self.inner.sessions.lock().push(entry);
        *self.inner.active.lock() = Some(id.clone());
        info!(session = %id, "Session created");
        id
    }

    /// Bind a display surface and spawn the remote PTY at its geometry
    pub async fn attach(
        &self,
        id: &SessionId,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<SessionHandle> {
        {
            let mut sessions = self.inner.sessions.lock();
            let entry = sessions
                .iter_mut()
                .find(|s| &s.id == id)
                .ok_or_else(|| SyncError::SessionNotFound(id.clone()))?;
            if entry.surface.is_some() {
                return Err(SyncError::InvalidOperation(format!(
                    "session {} already has a display surface",
                    id
                )));
            }
            // Bound before spawning so the first prompt is not lost
            entry.surface = Some(Arc::clone(&surface));
            entry.state = SessionState::Initializing;
        }

        let client = match self.inner.connection.client() {
            Ok(client) => client,
            Err(e) => {
                self.inner.fail_attach(id, &e);
                return Err(e);
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let route_id = id.clone();
        let sink: OutputSink = Arc::new(move |bytes: Vec<u8>| {
            if let Some(inner) = weak.upgrade() {
                inner.on_output(&route_id, &bytes);
            }
        });

        let (cols, rows) = surface.geometry();
        let handle = match client.spawn_session(cols, rows, sink).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(session = %id, error = %e, "Failed to spawn remote PTY");
                let e = SyncError::from(e);
                self.inner.fail_attach(id, &e);
                return Err(e);
            }
        };

        let still_open = {
            let mut sessions = self.inner.sessions.lock();
            match sessions.iter_mut().find(|s| &s.id == id) {
                Some(entry) => {
                    entry.handle = Some(handle);
                    entry.state = SessionState::Ready;
                    true
                }
                None => false,
            }
        };
        if !still_open {
            // Closed while the spawn was in flight
            if let Err(e) = client.kill_session(handle).await {
                debug!(session = %id, error = %e, "Kill of orphaned PTY failed");
            }
            return Err(SyncError::SessionNotFound(id.clone()));
        }

        info!(session = %id, pty = %handle, cols, rows, "Session attached");
        Ok(handle)
    }

    /// Forward keystrokes; the remote PTY does its own echo
    pub async fn send_keys(&self, id: &SessionId, bytes: &[u8]) -> Result<()> {
        let handle = self.inner.handle_of(id)?;
        let client = self.inner.connection.client()?;
        client.send_input(handle, bytes).await?;
        Ok(())
    }

    /// Route an output chunk to the session's surface and prompt heuristic.
    ///
    /// Chunks for unknown or closed sessions are dropped.
    pub fn on_output(&self, id: &SessionId, bytes: &[u8]) {
        self.inner.on_output(id, bytes);
    }

    pub async fn resize(&self, id: &SessionId, cols: u16, rows: u16) -> Result<()> {
        let handle = self.inner.handle_of(id)?;
        let client = self.inner.connection.client()?;
        client.resize(handle, cols, rows).await?;
        debug!(session = %id, cols, rows, "Session resized");
        Ok(())
    }

    /// Tear down one session.
    ///
    /// The session leaves the routing table and its surface is disposed
    /// before the remote PTY is killed. Activity falls back to the most
    /// recently created remaining session.
    pub async fn close_session(&self, id: &SessionId) -> Result<()> {
        let entry = {
            let mut sessions = self.inner.sessions.lock();
            let index = sessions
                .iter()
                .position(|s| &s.id == id)
                .ok_or_else(|| SyncError::SessionNotFound(id.clone()))?;
            let entry = sessions.remove(index);

            let mut active = self.inner.active.lock();
            if active.as_ref() == Some(id) {
                *active = sessions.last().map(|s| s.id.clone());
            }
            entry
        };

        entry.debouncer.cancel();
        if let Some(surface) = &entry.surface {
            surface.dispose();
        }

        if let Some(handle) = entry.handle {
            match self.inner.connection.client() {
                Ok(client) => {
                    if let Err(e) = client.kill_session(handle).await {
                        warn!(session = %id, pty = %handle, error = %e, "Failed to kill remote PTY");
                    }
                }
                Err(e) => warn!(session = %id, error = %e, "Remote gone; PTY not killed"),
            }
        }
        info!(session = %id, "Session closed");
        Ok(())
    }

    pub fn activate(&self, id: &SessionId) -> Result<()> {
        let sessions = self.inner.sessions.lock();
        if !sessions.iter().any(|s| &s.id == id) {
            return Err(SyncError::SessionNotFound(id.clone()));
        }
        *self.inner.active.lock() = Some(id.clone());
        Ok(())
    }

    pub fn active(&self) -> Option<SessionId> {
        self.inner.active.lock().clone()
    }

    /// Sessions in creation order
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner
            .sessions
            .lock()
            .iter()
            .map(|s| SessionInfo {
                id: s.id.clone(),
                display_name: s.display_name.clone(),
                state: s.state.clone(),
                handle: s.handle,
            })
            .collect()
    }

    /// Display rows for the session list
    pub fn rows(&self) -> Vec<SessionRow> {
        let active = self.active();
        self.sessions()
            .into_iter()
            .map(|s| SessionRow {
                active: active.as_ref() == Some(&s.id),
                id: s.id,
                display_name: s.display_name,
                state: s.state.to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matches keep being counted while auto-sync is off; they just never
    /// schedule a pull.
    pub fn set_auto_sync(&self, enabled: bool) {
        self.inner.auto_sync.store(enabled, Ordering::SeqCst);
        if !enabled {
            for session in self.inner.sessions.lock().iter() {
                session.debouncer.cancel();
            }
        }
        info!(enabled, "Auto-sync toggled");
    }

    pub fn auto_sync(&self) -> bool {
        self.inner.auto_sync.load(Ordering::SeqCst)
    }

    pub fn prompt_matches(&self) -> u64 {
        self.inner.prompt_matches.load(Ordering::Relaxed)
    }

    /// Pull and merge immediately, bypassing the prompt heuristic
    pub async fn sync_now(&self) -> Result<MergeReport> {
        self.inner.engine.sync_now().await
    }

    /// Close every session, newest first
    pub async fn close_all(&self) {
        let ids: Vec<SessionId> = self
            .inner
            .sessions
            .lock()
            .iter()
            .rev()
            .map(|s| s.id.clone())
            .collect();
        for id in ids {
            if let Err(e) = self.close_session(&id).await {
                debug!(session = %id, error = %e, "Session already gone");
            }
        }
    }
}
