//! Remote Capability Client
//!
//! Narrow contract over the remote execution environment: file I/O,
//! directory creation/removal, listing, PTY lifecycle, and one-shot
//! commands. Implementations are stateless façades over the remote
//! namespace; ordering between concurrent calls is the caller's concern.

pub mod connection;
pub mod local;
pub mod memory;
pub mod walk;

pub use connection::{ConnectionState, RemoteConnection};
pub use local::LocalSandbox;
pub use memory::{MemoryRemote, RemoteCall};
pub use walk::{walk, WalkEntry, WalkMode};

use crate::error::RemoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    /// Content length when the backend reports it cheaply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Result of a one-shot command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// None for background commands, which return before completion
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Remote PTY handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub u64);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pty-{}", self.0)
    }
}

/// Receives raw output bytes of one PTY session
pub type OutputSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Capability interface of the remote execution environment
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), RemoteError>;

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError>;

    /// Remove a file, or a directory together with everything below it
    async fn remove_file(&self, path: &str) -> Result<(), RemoteError>;

    async fn read_file(&self, path: &str) -> Result<String, RemoteError>;

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, RemoteError>;

    async fn spawn_session(
        &self,
        cols: u16,
        rows: u16,
        on_data: OutputSink,
    ) -> Result<SessionHandle, RemoteError>;

    async fn send_input(&self, handle: SessionHandle, bytes: &[u8]) -> Result<(), RemoteError>;

    async fn resize(&self, handle: SessionHandle, cols: u16, rows: u16)
        -> Result<(), RemoteError>;

    async fn kill_session(&self, handle: SessionHandle) -> Result<(), RemoteError>;

    async fn run_command(&self, cmd: &str, background: bool)
        -> Result<CommandOutput, RemoteError>;
}
