//! Explicit connection object shared by push, pull, the poller and sessions.

use super::RemoteClient;
use crate::error::{Result, SyncError};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Typed connection state
#[derive(Clone)]
pub enum ConnectionState {
    Disconnected {
        /// Persists until the next connection attempt
        last_error: Option<String>,
    },
    Connected(Arc<dyn RemoteClient>),
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected { last_error } => f
                .debug_struct("Disconnected")
                .field("last_error", last_error)
                .finish(),
            ConnectionState::Connected(_) => f.write_str("Connected"),
        }
    }
}

/// Handle to the remote environment, connected or not
#[derive(Debug)]
pub struct RemoteConnection {
    state: RwLock<ConnectionState>,
}

impl Default for RemoteConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteConnection {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected { last_error: None }),
        }
    }

    pub fn connected(client: Arc<dyn RemoteClient>) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Connected(client)),
        }
    }

    /// Install a client; clears any previous error message
    pub fn connect(&self, client: Arc<dyn RemoteClient>) {
        *self.state.write() = ConnectionState::Connected(client);
        info!("Remote connection established");
    }

    /// Release the client, returning it if one was held
    pub fn disconnect(&self) -> Option<Arc<dyn RemoteClient>> {
        let previous = std::mem::replace(
            &mut *self.state.write(),
            ConnectionState::Disconnected { last_error: None },
        );
        match previous {
            ConnectionState::Connected(client) => {
                info!("Remote connection released");
                Some(client)
            }
            ConnectionState::Disconnected { .. } => None,
        }
    }

    /// Record a connection/auth failure; the message sticks until the
    /// next `connect`.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "Remote connection failed");
        *self.state.write() = ConnectionState::Disconnected {
            last_error: Some(message),
        };
    }

    pub fn state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.read(), ConnectionState::Connected(_))
    }

    pub fn last_error(&self) -> Option<String> {
        match &*self.state.read() {
            ConnectionState::Disconnected { last_error } => last_error.clone(),
            ConnectionState::Connected(_) => None,
        }
    }

    /// The live client, or `RemoteUnavailable`
    pub fn client(&self) -> Result<Arc<dyn RemoteClient>> {
        match &*self.state.read() {
            ConnectionState::Connected(client) => Ok(Arc::clone(client)),
            ConnectionState::Disconnected { .. } => Err(SyncError::RemoteUnavailable),
        }
    }
}
