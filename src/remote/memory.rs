//! In-process remote used by tests and demos.
//!
//! Holds a path-keyed namespace and records every call in order, so callers
//! can assert on the exact sequence of remote operations. Faults can be
//! injected per path or for listings as a whole.

use super::{CommandOutput, DirEntry, OutputSink, RemoteClient, SessionHandle};
use crate::error::RemoteError;
use crate::tree::path::{normalize_base, split_parent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    WriteFile { path: String, content: String },
    MakeDir(String),
    RemoveFile(String),
    ReadFile(String),
    List(String),
    Spawn { cols: u16, rows: u16 },
    Input { handle: SessionHandle, bytes: Vec<u8> },
    Resize { handle: SessionHandle, cols: u16, rows: u16 },
    Kill(SessionHandle),
    Run { cmd: String, background: bool },
}

#[derive(Debug, Clone)]
enum Entry {
    Dir,
    File(String),
}

struct MemorySession {
    sink: OutputSink,
    input: Vec<u8>,
    geometry: (u16, u16),
    killed: bool,
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<String, Entry>,
    calls: Vec<RemoteCall>,
    sessions: HashMap<u64, MemorySession>,
    next_session: u64,
    report_sizes: bool,
    fail_list: bool,
    fail_spawn: bool,
    fail_reads: HashSet<String>,
    fail_writes: HashSet<String>,
    fail_make_dirs: HashSet<String>,
    vanish_on_read: HashSet<String>,
    command_outputs: HashMap<String, CommandOutput>,
}

/// In-memory remote namespace
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl std::fmt::Debug for MemoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryRemote")
            .field("entries", &state.entries.len())
            .field("calls", &state.calls.len())
            .field("sessions", &state.sessions.len())
            .finish()
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Empty namespace containing only `/`
    pub fn new() -> Self {
        let mut state = MemoryState {
            report_sizes: true,
            next_session: 1,
            ..Default::default()
        };
        state.entries.insert("/".to_string(), Entry::Dir);
        Self {
            state: Mutex::new(state),
        }
    }

    /// Namespace with `base` (and its ancestors) already present
    pub fn with_base(base: &str) -> Self {
        let remote = Self::new();
        remote.put_dir(base);
        remote
    }

    /// Stop reporting sizes in listings, forcing readers to fetch content
    pub fn without_sizes(self) -> Self {
        self.state.lock().report_sizes = false;
        self
    }

    /// Create a directory and any missing ancestors, without recording a call
    pub fn put_dir(&self, path: &str) {
        let mut state = self.state.lock();
        ensure_dirs(&mut state.entries, &normalize_base(path));
    }

    /// Create or overwrite a file, creating parents, without recording a call
    pub fn put_file(&self, path: &str, content: &str) {
        let mut state = self.state.lock();
        if let Some((parent, _)) = split_parent(path) {
            ensure_dirs(&mut state.entries, parent);
        }
        state
            .entries
            .insert(path.to_string(), Entry::File(content.to_string()));
    }

    /// Remove a path and everything below it, without recording a call
    pub fn remove(&self, path: &str) {
        let mut state = self.state.lock();
        remove_tree(&mut state.entries, path);
    }

    pub fn file(&self, path: &str) -> Option<String> {
        match self.state.lock().entries.get(path) {
            Some(Entry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state.lock().entries.get(path), Some(Entry::Dir))
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.state.lock().fail_spawn = fail;
    }

    pub fn fail_read(&self, path: &str) {
        self.state.lock().fail_reads.insert(path.to_string());
    }

    pub fn fail_write(&self, path: &str) {
        self.state.lock().fail_writes.insert(path.to_string());
    }

    pub fn fail_make_dir(&self, path: &str) {
        self.state.lock().fail_make_dirs.insert(path.to_string());
    }

    /// Delete `path` the next time it is read, as if another writer removed
    /// it after it was listed
    pub fn vanish_on_read(&self, path: &str) {
        self.state.lock().vanish_on_read.insert(path.to_string());
    }

    pub fn set_command_output(&self, cmd: &str, output: CommandOutput) {
        self.state
            .lock()
            .command_outputs
            .insert(cmd.to_string(), output);
    }

    /// Push bytes out of a session as if the remote PTY produced them
    pub fn emit_output(&self, handle: SessionHandle, bytes: &[u8]) -> bool {
        let sink = {
            let state = self.state.lock();
            match state.sessions.get(&handle.0) {
                Some(session) if !session.killed => session.sink.clone(),
                _ => return false,
            }
        };
        sink(bytes.to_vec());
        true
    }

    pub fn session_input(&self, handle: SessionHandle) -> Vec<u8> {
        self.state
            .lock()
            .sessions
            .get(&handle.0)
            .map(|s| s.input.clone())
            .unwrap_or_default()
    }

    pub fn session_geometry(&self, handle: SessionHandle) -> Option<(u16, u16)> {
        self.state.lock().sessions.get(&handle.0).map(|s| s.geometry)
    }

    pub fn is_killed(&self, handle: SessionHandle) -> bool {
        self.state
            .lock()
            .sessions
            .get(&handle.0)
            .map(|s| s.killed)
            .unwrap_or(false)
    }

    pub fn live_sessions(&self) -> usize {
        self.state
            .lock()
            .sessions
            .values()
            .filter(|s| !s.killed)
            .count()
    }
}

fn ensure_dirs(entries: &mut BTreeMap<String, Entry>, path: &str) {
    let mut current = String::new();
    entries.insert("/".to_string(), Entry::Dir);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        entries.entry(current.clone()).or_insert(Entry::Dir);
    }
}

fn remove_tree(entries: &mut BTreeMap<String, Entry>, path: &str) -> bool {
    let existed = entries.remove(path).is_some();
    let prefix = format!("{}/", path.trim_end_matches('/'));
    entries.retain(|key, _| !key.starts_with(&prefix));
    existed
}

fn parent_is_dir(entries: &BTreeMap<String, Entry>, path: &str) -> bool {
    match split_parent(path) {
        Some((parent, _)) => matches!(entries.get(parent), Some(Entry::Dir)),
        None => false,
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
        });
        if state.fail_writes.contains(path) {
            return Err(RemoteError::Rejected(format!("write refused: {}", path)));
        }
        if !parent_is_dir(&state.entries, path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if matches!(state.entries.get(path), Some(Entry::Dir)) {
            return Err(RemoteError::Rejected(format!("{} is a directory", path)));
        }
        state
            .entries
            .insert(path.to_string(), Entry::File(content.to_string()));
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::MakeDir(path.to_string()));
        if state.fail_make_dirs.contains(path) {
            return Err(RemoteError::Rejected(format!("mkdir refused: {}", path)));
        }
        if state.entries.contains_key(path) {
            return Err(RemoteError::AlreadyExists(path.to_string()));
        }
        if !parent_is_dir(&state.entries, path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        state.entries.insert(path.to_string(), Entry::Dir);
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::RemoveFile(path.to_string()));
        if remove_tree(&mut state.entries, path) {
            Ok(())
        } else {
            Err(RemoteError::NotFound(path.to_string()))
        }
    }

    async fn read_file(&self, path: &str) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::ReadFile(path.to_string()));
        if state.fail_reads.contains(path) {
            return Err(RemoteError::Rejected(format!("read refused: {}", path)));
        }
        if state.vanish_on_read.remove(path) {
            remove_tree(&mut state.entries, path);
        }
        match state.entries.get(path) {
            Some(Entry::File(content)) => Ok(content.clone()),
            _ => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::List(path.to_string()));
        if state.fail_list {
            return Err(RemoteError::Rejected("listing unavailable".to_string()));
        }
        if !matches!(state.entries.get(path), Some(Entry::Dir)) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let report_sizes = state.report_sizes;
        let entries = state
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                let rest = key.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some(match entry {
                    Entry::Dir => DirEntry {
                        name: rest.to_string(),
                        is_dir: true,
                        size: None,
                    },
                    Entry::File(content) => DirEntry {
                        name: rest.to_string(),
                        is_dir: false,
                        size: report_sizes.then(|| content.len() as u64),
                    },
                })
            })
            .collect();
        Ok(entries)
    }

    async fn spawn_session(
        &self,
        cols: u16,
        rows: u16,
        on_data: OutputSink,
    ) -> Result<SessionHandle, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Spawn { cols, rows });
        if state.fail_spawn {
            return Err(RemoteError::Rejected("pty spawn refused".to_string()));
        }
        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(
            id,
            MemorySession {
                sink: on_data,
                input: Vec::new(),
                geometry: (cols, rows),
                killed: false,
            },
        );
        Ok(SessionHandle(id))
    }

    async fn send_input(&self, handle: SessionHandle, bytes: &[u8]) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Input {
            handle,
            bytes: bytes.to_vec(),
        });
        match state.sessions.get_mut(&handle.0) {
            Some(session) if !session.killed => {
                session.input.extend_from_slice(bytes);
                Ok(())
            }
            _ => Err(RemoteError::SessionClosed(handle.to_string())),
        }
    }

    async fn resize(
        &self,
        handle: SessionHandle,
        cols: u16,
        rows: u16,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Resize { handle, cols, rows });
        match state.sessions.get_mut(&handle.0) {
            Some(session) if !session.killed => {
                session.geometry = (cols, rows);
                Ok(())
            }
            _ => Err(RemoteError::SessionClosed(handle.to_string())),
        }
    }

    async fn kill_session(&self, handle: SessionHandle) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Kill(handle));
        match state.sessions.get_mut(&handle.0) {
            Some(session) if !session.killed => {
                session.killed = true;
                Ok(())
            }
            _ => Err(RemoteError::SessionClosed(handle.to_string())),
        }
    }

    async fn run_command(
        &self,
        cmd: &str,
        background: bool,
    ) -> Result<CommandOutput, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Run {
            cmd: cmd.to_string(),
            background,
        });
        if background {
            return Ok(CommandOutput::default());
        }
        Ok(state
            .command_outputs
            .get(cmd)
            .cloned()
            .unwrap_or(CommandOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_make_dir_reports_existing() {
        let remote = MemoryRemote::with_base("/base");
        remote.make_dir("/base/src").await.unwrap();
        assert!(matches!(
            remote.make_dir("/base/src").await,
            Err(RemoteError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_write_requires_parent_dir() {
        let remote = MemoryRemote::with_base("/base");
        assert!(matches!(
            remote.write_file("/base/missing/a.txt", "a").await,
            Err(RemoteError::NotFound(_))
        ));
        remote.write_file("/base/a.txt", "a").await.unwrap();
        assert_eq!(remote.file("/base/a.txt").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_remove_directory_is_recursive() {
        let remote = MemoryRemote::with_base("/base");
        remote.put_file("/base/src/a.rs", "a");
        remote.put_file("/base/src2/b.rs", "b");
        remote.remove_file("/base/src").await.unwrap();
        assert!(!remote.is_dir("/base/src"));
        assert!(remote.file("/base/src/a.rs").is_none());
        assert_eq!(remote.file("/base/src2/b.rs").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_sessions_record_input_and_kill() {
        let remote = MemoryRemote::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let handle = remote
            .spawn_session(
                80,
                24,
                std::sync::Arc::new(move |bytes: Vec<u8>| sink_seen.lock().extend(bytes)),
            )
            .await
            .unwrap();
        remote.send_input(handle, b"ls\n").await.unwrap();
        assert!(remote.emit_output(handle, b"out"));
        assert_eq!(remote.session_input(handle), b"ls\n".to_vec());
        assert_eq!(&*seen.lock(), b"out");

        remote.kill_session(handle).await.unwrap();
        assert!(remote.is_killed(handle));
        assert!(!remote.emit_output(handle, b"late"));
        assert!(remote.send_input(handle, b"x").await.is_err());
    }
}
