//! Local-directory sandbox backend.
//!
//! Treats a directory on this machine as the remote environment: remote
//! absolute paths are mapped below the sandbox root, files go through
//! `tokio::fs`, commands run under `sh -c`, and terminal sessions are real
//! PTYs from `portable-pty`.

use super::{CommandOutput, DirEntry, OutputSink, RemoteClient, SessionHandle};
use crate::error::RemoteError;
use async_trait::async_trait;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

struct LocalPty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

/// Sandbox rooted at a local directory
pub struct LocalSandbox {
    root: PathBuf,
    workdir: PathBuf,
    shell: String,
    ptys: Mutex<HashMap<u64, LocalPty>>,
    next_pty: AtomicU64,
}

impl std::fmt::Debug for LocalSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSandbox")
            .field("root", &self.root)
            .field("workdir", &self.workdir)
            .field("shell", &self.shell)
            .finish()
    }
}

impl LocalSandbox {
    /// Open a sandbox at `root`, creating the directory backing `base_prefix`.
    ///
    /// Commands and shells start in that directory.
    pub fn open(
        root: impl Into<PathBuf>,
        base_prefix: &str,
        shell: &str,
    ) -> Result<Self, RemoteError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        let workdir = map_path(&root, base_prefix)?;
        std::fs::create_dir_all(&workdir)?;
        info!(root = %root.display(), workdir = %workdir.display(), "Opened local sandbox");
        Ok(Self {
            root,
            workdir,
            shell: shell.to_string(),
            ptys: Mutex::new(HashMap::new()),
            next_pty: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local(&self, path: &str) -> Result<PathBuf, RemoteError> {
        map_path(&self.root, path)
    }
}

/// Map a remote absolute path below `root`, refusing `..` escapes
fn map_path(root: &Path, remote: &str) -> Result<PathBuf, RemoteError> {
    let mut out = root.to_path_buf();
    for component in Path::new(remote).components() {
        match component {
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(RemoteError::Rejected(format!(
                    "path escapes sandbox: {}",
                    remote
                )))
            }
            Component::Normal(name) => out.push(name),
        }
    }
    Ok(out)
}

fn io_error(path: &str, err: std::io::Error) -> RemoteError {
    match err.kind() {
        ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists => RemoteError::AlreadyExists(path.to_string()),
        _ => RemoteError::Io(err),
    }
}

fn pty_error(err: impl std::fmt::Display) -> RemoteError {
    RemoteError::Rejected(format!("pty: {}", err))
}

#[async_trait]
impl RemoteClient for LocalSandbox {
    async fn write_file(&self, path: &str, content: &str) -> Result<(), RemoteError> {
        let local = self.local(path)?;
        tokio::fs::write(&local, content)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        let local = self.local(path)?;
        tokio::fs::create_dir(&local)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn remove_file(&self, path: &str) -> Result<(), RemoteError> {
        let local = self.local(path)?;
        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|e| io_error(path, e))?;
        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(&local).await
        } else {
            tokio::fs::remove_file(&local).await
        };
        result.map_err(|e| io_error(path, e))
    }

    async fn read_file(&self, path: &str) -> Result<String, RemoteError> {
        let local = self.local(path)?;
        let bytes = tokio::fs::read(&local)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>, RemoteError> {
        let local = self.local(path)?;
        let mut dir = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| io_error(path, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: (!meta.is_dir()).then(|| meta.len()),
            });
        }
        Ok(entries)
    }

    async fn spawn_session(
        &self,
        cols: u16,
        rows: u16,
        on_data: OutputSink,
    ) -> Result<SessionHandle, RemoteError> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)?;

        let mut cmd = CommandBuilder::new(&self.shell);
        cmd.cwd(&self.workdir);
        cmd.env("TERM", "xterm-256color");
        let child = pair.slave.spawn_command(cmd).map_err(pty_error)?;
        drop(pair.slave);

        let mut reader = pair.master.try_clone_reader().map_err(pty_error)?;
        let writer = pair.master.take_writer().map_err(pty_error)?;

        let id = self.next_pty.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle(id);
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => on_data(buf[..n].to_vec()),
                    Err(e) => {
                        debug!(session = %handle, error = %e, "PTY reader stopped");
                        break;
                    }
                }
            }
        });

        self.ptys.lock().insert(
            id,
            LocalPty {
                master: pair.master,
                writer,
                child,
            },
        );
        info!(session = %handle, cols, rows, shell = %self.shell, "Spawned local PTY");
        Ok(handle)
    }

    async fn send_input(&self, handle: SessionHandle, bytes: &[u8]) -> Result<(), RemoteError> {
        let mut ptys = self.ptys.lock();
        let pty = ptys
            .get_mut(&handle.0)
            .ok_or_else(|| RemoteError::SessionClosed(handle.to_string()))?;
        pty.writer.write_all(bytes)?;
        pty.writer.flush()?;
        Ok(())
    }

    async fn resize(
        &self,
        handle: SessionHandle,
        cols: u16,
        rows: u16,
    ) -> Result<(), RemoteError> {
        let ptys = self.ptys.lock();
        let pty = ptys
            .get(&handle.0)
            .ok_or_else(|| RemoteError::SessionClosed(handle.to_string()))?;
        pty.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)
    }

    async fn kill_session(&self, handle: SessionHandle) -> Result<(), RemoteError> {
        let pty = self
            .ptys
            .lock()
            .remove(&handle.0)
            .ok_or_else(|| RemoteError::SessionClosed(handle.to_string()))?;
        let LocalPty {
            master,
            writer,
            mut child,
        } = pty;
        if let Err(e) = child.kill() {
            warn!(session = %handle, error = %e, "Failed to kill PTY child");
        }
        drop(writer);
        drop(master);
        info!(session = %handle, "Killed local PTY");
        Ok(())
    }

    async fn run_command(
        &self,
        cmd: &str,
        background: bool,
    ) -> Result<CommandOutput, RemoteError> {
        let mut command = tokio::process::Command::new("sh");
        command.arg("-c").arg(cmd).current_dir(&self.workdir);

        if background {
            let child = command.spawn()?;
            debug!(cmd, pid = ?child.id(), "Started background command");
            return Ok(CommandOutput::default());
        }

        let output = command.output().await?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
