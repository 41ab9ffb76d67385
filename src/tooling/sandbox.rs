//! Sandbox façade: one object owning the connection and everything that
//! depends on it.

use crate::config::SandsyncConfig;
use crate::error::Result;
use crate::remote::{RemoteClient, RemoteConnection};
use crate::session::SessionMultiplexer;
use crate::sync::{PullScheduler, PushReport, SyncEngine};
use crate::watch::{ChangeSource, RemotePoller, Subscription};
use crate::workspace::Workspace;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Sandbox {
    config: SandsyncConfig,
    connection: Arc<RemoteConnection>,
    engine: Arc<SyncEngine>,
    poller: Arc<RemotePoller>,
    scheduler: Arc<PullScheduler>,
    sessions: SessionMultiplexer,
    follow: Mutex<Option<Subscription>>,
}

impl Sandbox {
    pub fn new(config: SandsyncConfig) -> Result<Self> {
        let workspace = Workspace::new(&config.remote.base_prefix);
        Self::with_workspace(config, workspace)
    }

    /// Start from an existing workspace, e.g. one imported from disk
    pub fn with_workspace(config: SandsyncConfig, workspace: Workspace) -> Result<Self> {
        config.validate()?;
        let connection = Arc::new(RemoteConnection::new());
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&connection),
            Arc::new(RwLock::new(workspace)),
        ));
        let poller = Arc::new(RemotePoller::new(
            Arc::clone(&connection),
            &config.remote.base_prefix,
            config.watch.poll_interval(),
        ));
        let scheduler = PullScheduler::new(Arc::clone(&engine), config.sync.coalesce_window());
        let sessions = SessionMultiplexer::new(
            Arc::clone(&connection),
            Arc::clone(&engine),
            Arc::clone(&scheduler),
            &config.sessions,
        )?;

        Ok(Self {
            config,
            connection,
            engine,
            poller,
            scheduler,
            sessions,
            follow: Mutex::new(None),
        })
    }

    /// Install `client`, start background work, and push the workspace.
    ///
    /// The returned report covers the initial push; a partial push does not
    /// undo the connection.
    pub async fn connect(&self, client: Arc<dyn RemoteClient>) -> Result<PushReport> {
        self.connection.connect(client);
        self.scheduler.start();
        self.poller.start();
        {
            let mut follow = self.follow.lock();
            if follow.is_none() {
                *follow = Some(SyncEngine::follow(
                    self.poller.as_ref(),
                    Arc::clone(&self.scheduler),
                ));
            }
        }

        let report = self.engine.push_all().await?;
        if !report.is_complete() {
            warn!(failed = report.failed.len(), "Initial push was partial");
        }
        info!(pushed = report.succeeded, "Sandbox connected");
        Ok(report)
    }

    /// Close every session, stop background work, and release the remote handle
    pub async fn disconnect(&self) {
        self.sessions.close_all().await;
        self.poller.stop();
        if let Some(subscription) = self.follow.lock().take() {
            subscription.unsubscribe();
        }
        self.scheduler.shutdown();
        self.connection.disconnect();
        info!("Sandbox disconnected");
    }

    /// Record a connection failure; it persists until the next `connect`
    pub fn fail(&self, message: impl Into<String>) {
        self.connection.fail(message);
    }

    pub fn config(&self) -> &SandsyncConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<RemoteConnection> {
        &self.connection
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn poller(&self) -> &Arc<RemotePoller> {
        &self.poller
    }

    pub fn scheduler(&self) -> &Arc<PullScheduler> {
        &self.scheduler
    }

    pub fn sessions(&self) -> &SessionMultiplexer {
        &self.sessions
    }

    pub fn workspace(&self) -> Arc<RwLock<Workspace>> {
        self.engine.workspace()
    }
}
