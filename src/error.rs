//! Error types for the sandbox sync engine.

use crate::types::{NodeId, SessionId};
use thiserror::Error;

/// Errors returned by a remote capability client call
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Remote call rejected: {0}")]
    Rejected(String),

    #[error("Remote session closed: {0}")]
    SessionClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote unavailable: no active connection")]
    RemoteUnavailable,

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::ConfigError(err.to_string())
    }
}

impl SyncError {
    /// True when the failure is transient from the caller's point of view
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable | SyncError::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
