//! Push planning and reporting.

use crate::error::Result;
use crate::tree::EntryKind;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};

/// One remote call a push will issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOp {
    MakeDir { path: String },
    WriteFile { path: String, content: String },
}

impl PushOp {
    pub fn path(&self) -> &str {
        match self {
            PushOp::MakeDir { path } | PushOp::WriteFile { path, .. } => path,
        }
    }
}

/// Ordered operations for a full push.
///
/// Every folder comes before any file, so no file write is issued before
/// its parent's `make_dir`. Folders are ordered by depth so a parent
/// directory is always created before its children.
pub fn plan_push(workspace: &Workspace) -> Result<Vec<PushOp>> {
    let tree = workspace.tree();
    let mut folders = Vec::new();
    let mut files = Vec::new();

    for node in tree.non_root_nodes() {
        let path = workspace.path_of(&node.id)?;
        match node.entry_kind() {
            EntryKind::Folder => folders.push(path),
            EntryKind::File => files.push(PushOp::WriteFile {
                path,
                content: node.content().unwrap_or_default().to_string(),
            }),
        }
    }

    folders.sort_by(|a, b| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));
    files.sort_by(|a, b| a.path().cmp(b.path()));

    let mut ops: Vec<PushOp> = folders
        .into_iter()
        .map(|path| PushOp::MakeDir { path })
        .collect();
    ops.extend(files);
    Ok(ops)
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Outcome of a best-effort batch push
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// (path, error message) for every call that failed
    pub failed: Vec<(String, String)>,
}

impl PushReport {
    /// True only if every call returned ok
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.attempted == self.succeeded
    }

    pub(crate) fn record(&mut self, path: &str, outcome: std::result::Result<(), String>) {
        self.attempted += 1;
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(message) => self.failed.push((path.to_string(), message)),
        }
    }
}
