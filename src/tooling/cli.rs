//! CLI Tooling
//!
//! Command-line interface over the local sandbox backend: push a directory,
//! pull the sandbox tree, watch for remote changes, run commands, and open
//! an interactive shell that keeps the tree reconciled.

use crate::config::{xdg, ConfigLoader, SandsyncConfig};
use crate::error::{Result, SyncError};
use crate::logging::LoggingConfig;
use crate::remote::{LocalSandbox, RemoteClient, RemoteConnection};
use crate::session::{DisplaySurface, SessionMultiplexer};
use crate::sync::MergeReport;
use crate::tooling::sandbox::Sandbox;
use crate::tree::EntryKind;
use crate::types::{NodeId, SessionId};
use crate::watch::{ChangeEvent, ChangeKind, RemotePoller};
use crate::workspace::{format_sessions_text, format_snapshot_text, Workspace};
use clap::{Parser, Subcommand};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures::StreamExt;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Sandsync CLI - keep a local tree reconciled with a sandbox
#[derive(Parser)]
#[command(name = "sandsync")]
#[command(about = "Mirror a file tree into a sandbox and drive its terminals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where sandsync.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Local directory backing the sandbox
    #[arg(long)]
    pub sandbox: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Overlay the log flags on the configured logging section
    pub fn logging_config(&self, configured: &LoggingConfig) -> LoggingConfig {
        let mut logging = configured.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a local directory and push it into the sandbox
    Push {
        /// Directory to import
        dir: PathBuf,
    },
    /// Pull the sandbox tree and print it
    Pull {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Poll the sandbox and print what changes
    Watch {
        /// Poll interval in milliseconds (defaults to watch.poll_interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many polls (default: until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run a one-shot command in the sandbox
    Exec {
        /// Command line, run through `sh -c`
        cmd: String,
        /// Return immediately without waiting for completion
        #[arg(long)]
        background: bool,
    },
    /// Open an interactive shell in the sandbox
    Shell {
        /// Disable pulls after detected prompts
        #[arg(long)]
        no_auto_sync: bool,
    },
}

/// CLI context: resolved configuration and sandbox location
pub struct CliContext {
    config: SandsyncConfig,
    workspace_root: PathBuf,
    sandbox_root: PathBuf,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        sandbox: Option<PathBuf>,
    ) -> Result<Self> {
        let config = if let Some(cfg_path) = &config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        let sandbox_root = match sandbox.or_else(|| config.remote.sandbox_root.clone()) {
            Some(root) => root,
            None => xdg::default_sandbox_root()?,
        };

        Ok(Self {
            config,
            workspace_root,
            sandbox_root,
        })
    }

    pub fn config(&self) -> &SandsyncConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Execute a CLI command on a fresh multi-threaded runtime
    pub fn execute(&self, command: &Commands) -> Result<String> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SyncError::InvalidOperation(
                "execute() cannot be called from within an async runtime; use execute_async()"
                    .to_string(),
            ));
        }
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.execute_async(command))
    }

    pub async fn execute_async(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Push { dir } => self.push(dir).await,
            Commands::Pull { format } => self.pull(format).await,
            Commands::Watch {
                interval_ms,
                ticks,
                format,
            } => self.watch(*interval_ms, *ticks, format).await,
            Commands::Exec { cmd, background } => self.exec(cmd, *background).await,
            Commands::Shell { no_auto_sync } => self.shell(!no_auto_sync).await,
        }
    }

    fn open_client(&self) -> Result<Arc<dyn RemoteClient>> {
        let sandbox = LocalSandbox::open(
            &self.sandbox_root,
            &self.config.remote.base_prefix,
            &self.config.remote.shell,
        )?;
        Ok(Arc::new(sandbox))
    }

    async fn push(&self, dir: &Path) -> Result<String> {
        let workspace = import_directory(dir, &self.config.remote.base_prefix)?;
        let imported = workspace.tree().len() - 1;
        let sandbox = Sandbox::with_workspace(self.config.clone(), workspace)?;
        let report = sandbox.connect(self.open_client()?).await;
        sandbox.disconnect().await;
        let report = report?;

        if !report.is_complete() {
            for (path, error) in &report.failed {
                warn!(path = %path, error = %error, "Push failed");
            }
            let first = report
                .failed
                .first()
                .map(|(path, error)| format!(" (first: {}: {})", path, error))
                .unwrap_or_default();
            return Err(SyncError::InvalidOperation(format!(
                "push incomplete: {} of {} entries failed{}",
                report.failed.len(),
                report.attempted,
                first
            )));
        }

        info!(entries = imported, "Directory pushed");
        Ok(format!(
            "Pushed {} entries from {} to {}",
            report.succeeded,
            dir.display(),
            self.config.remote.base_prefix
        ))
    }

    async fn pull(&self, format: &str) -> Result<String> {
        let sandbox = Sandbox::new(self.config.clone())?;
        let pulled = self.pull_into(&sandbox).await;
        let snapshot = sandbox.workspace().read().snapshot();
        sandbox.disconnect().await;
        let report = pulled?;
        let snapshot = snapshot?;
        debug!(inserted = report.inserted, "Pulled sandbox tree");

        match format {
            "json" => serde_json::to_string_pretty(&snapshot)
                .map_err(|e| SyncError::InvalidOperation(format!("JSON encoding failed: {}", e))),
            "text" => Ok(format_snapshot_text(&snapshot)),
            other => Err(SyncError::InvalidOperation(format!(
                "unknown format '{}' (expected text or json)",
                other
            ))),
        }
    }

    async fn pull_into(&self, sandbox: &Sandbox) -> Result<MergeReport> {
        sandbox.connect(self.open_client()?).await?;
        sandbox.engine().sync_now().await
    }

    async fn watch(
        &self,
        interval_ms: Option<u64>,
        ticks: Option<u64>,
        format: &str,
    ) -> Result<String> {
        let json = match format {
            "json" => true,
            "text" => false,
            other => {
                return Err(SyncError::InvalidOperation(format!(
                    "unknown format '{}' (expected text or json)",
                    other
                )))
            }
        };
        let interval = interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.watch.poll_interval());
        if interval.is_zero() {
            return Err(SyncError::ConfigError(
                "watch interval must be greater than zero".to_string(),
            ));
        }

        let connection = Arc::new(RemoteConnection::connected(self.open_client()?));
        let poller = RemotePoller::new(connection, &self.config.remote.base_prefix, interval);
        let print = |event: &ChangeEvent| {
            let line = if json {
                serde_json::to_string(event).unwrap_or_default()
            } else {
                format_event(event)
            };
            println!("{}", line);
        };

        // Baseline: everything already present counts as created
        let mut polls = 0u64;
        let mut seen = 0usize;
        loop {
            if let Some(limit) = ticks {
                if polls >= limit {
                    break;
                }
            }
            if polls > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            match poller.tick().await {
                Ok(events) => {
                    seen += events.len();
                    events.iter().for_each(&print);
                }
                Err(e) => warn!(error = %e, "Poll failed"),
            }
            polls += 1;
        }

        Ok(format!("{} changes over {} polls", seen, polls))
    }

    async fn exec(&self, cmd: &str, background: bool) -> Result<String> {
        let client = self.open_client()?;
        let output = client.run_command(cmd, background).await?;
        if background {
            return Ok(format!("Started in background: {}", cmd));
        }

        if !output.stderr.is_empty() {
            eprint!("{}", output.stderr);
        }
        match output.exit_code {
            Some(0) => Ok(output.stdout.trim_end().to_string()),
            code => {
                print!("{}", output.stdout);
                Err(SyncError::InvalidOperation(format!(
                    "command exited with status {}",
                    code.map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                )))
            }
        }
    }

    async fn shell(&self, auto_sync: bool) -> Result<String> {
        let sandbox = Sandbox::new(self.config.clone())?;
        let outcome = self.run_shell(&sandbox, auto_sync).await;
        let rows = format_sessions_text(&sandbox.sessions().rows());
        let pulls = sandbox.scheduler().completed_pulls();
        let prompts = sandbox.sessions().prompt_matches();
        sandbox.disconnect().await;
        outcome?;

        Ok(format!(
            "{}Shell closed after {} prompts and {} pulls",
            rows, prompts, pulls
        ))
    }

    async fn run_shell(&self, sandbox: &Sandbox, auto_sync: bool) -> Result<()> {
        sandbox.connect(self.open_client()?).await?;
        let sessions = sandbox.sessions();
        sessions.set_auto_sync(auto_sync);

        let settings = &self.config.sessions;
        let (cols, rows) = terminal::size().unwrap_or_else(|e| {
            debug!(error = %e, "Terminal size unavailable; using configured geometry");
            (settings.default_cols, settings.default_rows)
        });
        let surface = Arc::new(TerminalSurface::new(cols, rows));

        let id = sessions.create_session();
        sessions.attach(&id, Arc::clone(&surface) as Arc<dyn DisplaySurface>).await?;

        let _raw = RawModeGuard::enable()?;
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            if !forward_event(sessions, &id, &surface, event?).await {
                break;
            }
        }
        Ok(())
    }
}

/// Relay one terminal event to the session; returns false once the shell should close
async fn forward_event(
    sessions: &SessionMultiplexer,
    id: &SessionId,
    surface: &TerminalSurface,
    event: Event,
) -> bool {
    let bytes = match event {
        Event::Key(key) if is_detach_key(&key) => return false,
        Event::Key(key) => match key_to_bytes(&key) {
            Some(bytes) => bytes,
            None => return true,
        },
        Event::Paste(text) => text.into_bytes(),
        Event::Resize(cols, rows) => {
            if surface.set_geometry(cols, rows) {
                if let Err(e) = sessions.resize(id, cols, rows).await {
                    warn!(error = %e, "Resize was not forwarded");
                }
            }
            return true;
        }
        _ => return true,
    };

    if let Err(e) = sessions.send_keys(id, &bytes).await {
        debug!(error = %e, "Shell input rejected; closing");
        return false;
    }
    true
}

/// Puts the controlling terminal in raw mode until dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

/// Ctrl-] leaves the shell; every other key goes to the remote session
fn is_detach_key(key: &KeyEvent) -> bool {
    key.kind != KeyEventKind::Release
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && key.code == KeyCode::Char(']')
}

/// Encode a key press the way a VT100-style terminal would send it
fn key_to_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let bytes: Vec<u8> = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let control = match c {
                'a'..='z' | 'A'..='Z' => c.to_ascii_lowercase() as u8 - b'a' + 1,
                ' ' | '@' | '2' => 0x00,
                '[' | '3' => 0x1b,
                '\\' | '4' => 0x1c,
                ']' | '5' => 0x1d,
                '^' | '6' => 0x1e,
                '_' | '7' => 0x1f,
                _ => return None,
            };
            vec![control]
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::F(n @ 1..=4) => vec![0x1b, b'O', b'P' + (n - 1)],
        KeyCode::F(n) => {
            let code = match n {
                5 => 15,
                6 => 17,
                7 => 18,
                8 => 19,
                9 => 20,
                10 => 21,
                11 => 23,
                12 => 24,
                _ => return None,
            };
            format!("\x1b[{}~", code).into_bytes()
        }
        _ => return None,
    };

    // Alt prefixes the sequence with ESC
    if key.modifiers.contains(KeyModifiers::ALT) {
        let mut prefixed = Vec::with_capacity(bytes.len() + 1);
        prefixed.push(0x1b);
        prefixed.extend(bytes);
        return Some(prefixed);
    }
    Some(bytes)
}

/// Build a workspace from a local directory.
///
/// Hidden `.git` directories are skipped, as are files that are not UTF-8.
pub fn import_directory(dir: &Path, base_prefix: &str) -> Result<Workspace> {
    if !dir.is_dir() {
        return Err(SyncError::InvalidOperation(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut workspace = Workspace::new(base_prefix);
    let mut folders: HashMap<PathBuf, NodeId> = HashMap::new();
    folders.insert(PathBuf::new(), workspace.root_id().clone());

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| SyncError::InvalidOperation(e.to_string()))?
            .to_path_buf();
        let parent_rel = relative.parent().map(Path::to_path_buf).unwrap_or_default();
        let Some(parent) = folders.get(&parent_rel).cloned() else {
            // Parent was skipped
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            let node = workspace.create(&parent, &name, EntryKind::Folder)?;
            folders.insert(relative, node.id);
        } else if entry.file_type().is_file() {
            let bytes = std::fs::read(entry.path())?;
            let content = match String::from_utf8(bytes) {
                Ok(content) => content,
                Err(_) => {
                    warn!(path = %entry.path().display(), "Skipping non-UTF-8 file");
                    continue;
                }
            };
            let node = workspace.create(&parent, &name, EntryKind::File)?;
            workspace.update(&node.id, content)?;
        }
    }

    info!(
        dir = %dir.display(),
        nodes = workspace.tree().len() - 1,
        "Imported directory"
    );
    Ok(workspace)
}

/// One colored line per change event
pub fn format_event(event: &ChangeEvent) -> String {
    let label = event.kind.label();
    let kind = match event.kind {
        ChangeKind::Created => format!("{:<8}", label).green().to_string(),
        ChangeKind::Modified => format!("{:<8}", label).yellow().to_string(),
        ChangeKind::Deleted => format!("{:<8}", label).red().to_string(),
    };
    let suffix = if event.is_directory { "/" } else { "" };
    format!("{} {}{}", kind, event.path, suffix)
}

/// Display surface writing PTY output straight to this process's stdout
struct TerminalSurface {
    geometry: Mutex<(u16, u16)>,
    disposed: AtomicBool,
}

impl TerminalSurface {
    fn new(cols: u16, rows: u16) -> Self {
        Self {
            geometry: Mutex::new((cols, rows)),
            disposed: AtomicBool::new(false),
        }
    }

    /// Record new terminal dimensions; returns false when nothing changed
    fn set_geometry(&self, cols: u16, rows: u16) -> bool {
        let mut geometry = self.geometry.lock();
        if *geometry == (cols, rows) {
            return false;
        }
        *geometry = (cols, rows);
        true
    }
}

impl DisplaySurface for TerminalSurface {
    fn write(&self, bytes: &[u8]) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
            debug!(error = %e, "Terminal write failed");
        }
    }

    fn geometry(&self) -> (u16, u16) {
        *self.geometry.lock()
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}
