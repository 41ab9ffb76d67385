//! Reconciliation Engine
//!
//! Mirrors the local workspace onto the remote namespace and back. Push
//! writes local state out; pull synthesizes a fresh tree from a recursive
//! listing; the result is either swapped in wholesale or merged by path.
//! The workspace lock is only held for the synchronous parts of each
//! operation, never across a remote call.

pub mod merge;
pub mod pull;
pub mod push;
pub mod scheduler;

pub use merge::MergeReport;
pub use push::{PushOp, PushReport};
pub use scheduler::PullScheduler;

use crate::error::{RemoteError, Result, SyncError};
use crate::remote::{walk, RemoteConnection, WalkMode};
use crate::tree::{EntryKind, Node, VirtualTree};
use crate::types::NodeId;
use crate::watch::{ChangeEvent, ChangeSource, Subscription};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// UI-facing sync indicator. Not a lock: pushes and pulls may overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success { at: DateTime<Utc> },
    Error { message: String, at: DateTime<Utc> },
}

/// A local mutation together with the outcome of mirroring it remotely.
///
/// The local change always stands; `remote` carries the push result.
#[derive(Debug)]
pub struct Mirrored<T> {
    pub value: T,
    pub remote: Result<()>,
}

impl<T> Mirrored<T> {
    pub fn is_synced(&self) -> bool {
        self.remote.is_ok()
    }
}

pub struct SyncEngine {
    connection: Arc<RemoteConnection>,
    workspace: Arc<RwLock<Workspace>>,
    status: RwLock<SyncStatus>,
    in_flight: AtomicUsize,
}

impl SyncEngine {
    pub fn new(connection: Arc<RemoteConnection>, workspace: Arc<RwLock<Workspace>>) -> Self {
        Self {
            connection,
            workspace,
            status: RwLock::new(SyncStatus::Idle),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn connection(&self) -> &Arc<RemoteConnection> {
        &self.connection
    }

    pub fn workspace(&self) -> Arc<RwLock<Workspace>> {
        Arc::clone(&self.workspace)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        *self.status.write() = SyncStatus::Syncing;
    }

    fn finish(&self, error: Option<String>) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        let at = Utc::now();
        let mut status = self.status.write();
        match error {
            Some(message) => *status = SyncStatus::Error { message, at },
            // Another operation still running keeps the indicator on syncing
            None if remaining > 0 => {}
            None => *status = SyncStatus::Success { at },
        }
    }

    /// Push every non-root node. Best-effort: every node is attempted.
    pub async fn push_all(&self) -> Result<PushReport> {
        let client = self.connection.client()?;
        let ops = push::plan_push(&self.workspace.read())?;
        self.begin();
        info!(ops = ops.len(), "Pushing workspace");

        let (dirs, files): (Vec<PushOp>, Vec<PushOp>) = ops
            .into_iter()
            .partition(|op| matches!(op, PushOp::MakeDir { .. }));

        let mut report = PushReport::default();
        for op in &dirs {
            let outcome = match client.make_dir(op.path()).await {
                Ok(()) | Err(RemoteError::AlreadyExists(_)) => Ok(()),
                Err(e) => {
                    warn!(path = op.path(), error = %e, "make_dir failed");
                    Err(e.to_string())
                }
            };
            report.record(op.path(), outcome);
        }

        let writes = files.iter().map(|op| {
            let client = Arc::clone(&client);
            async move {
                match op {
                    PushOp::WriteFile { path, content } => client
                        .write_file(path, content)
                        .await
                        .map_err(|e| {
                            warn!(path = %path, error = %e, "write_file failed");
                            e.to_string()
                        }),
                    PushOp::MakeDir { .. } => Ok(()),
                }
            }
        });
        for (op, outcome) in files.iter().zip(join_all(writes).await) {
            report.record(op.path(), outcome);
        }

        let error = (!report.is_complete())
            .then(|| format!("{} of {} pushes failed", report.failed.len(), report.attempted));
        self.finish(error);
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            "Push finished"
        );
        Ok(report)
    }

    /// Mirror a single node: `make_dir` for folders, `write_file` for files
    pub async fn push_node(&self, id: &NodeId) -> Result<()> {
        let client = self.connection.client()?;
        let (path, content) = {
            let ws = self.workspace.read();
            let node = ws
                .tree()
                .get(id)
                .ok_or_else(|| SyncError::NodeNotFound(id.clone()))?;
            if node.parent_id.is_none() {
                return Err(SyncError::InvalidOperation(
                    "the root is not pushed".to_string(),
                ));
            }
            (ws.path_of(id)?, node.content().map(str::to_string))
        };

        let result = match content {
            Some(content) => client.write_file(&path, &content).await,
            None => match client.make_dir(&path).await {
                Err(RemoteError::AlreadyExists(_)) => Ok(()),
                other => other,
            },
        };
        if let Err(e) = &result {
            warn!(path = %path, error = %e, "Push of node failed");
            *self.status.write() = SyncStatus::Error {
                message: e.to_string(),
                at: Utc::now(),
            };
        } else {
            debug!(path = %path, "Pushed node");
        }
        result.map_err(SyncError::from)
    }

    /// Editing-surface event: replace the whole buffer and push it
    pub async fn edit(&self, id: &NodeId, content: impl Into<String>) -> Result<Mirrored<()>> {
        self.workspace.write().update(id, content)?;
        let remote = self.push_node(id).await;
        Ok(Mirrored { value: (), remote })
    }

    pub async fn create(
        &self,
        parent_id: &NodeId,
        name: &str,
        kind: EntryKind,
    ) -> Result<Mirrored<Node>> {
        let node = self.workspace.write().create(parent_id, name, kind)?;
        let remote = self.push_node(&node.id).await;
        Ok(Mirrored {
            value: node,
            remote,
        })
    }

    /// Cascade-delete locally, then remove the subtree root remotely.
    ///
    /// One `remove_file` covers the whole subtree since remote removal of a
    /// directory is recursive.
    pub async fn delete(&self, id: &NodeId) -> Result<Mirrored<Vec<NodeId>>> {
        let (path, removed) = {
            let mut ws = self.workspace.write();
            let path = ws.path_of(id)?;
            (path, ws.delete(id)?)
        };
        info!(path = %path, removed = removed.len(), "Deleted subtree");

        let remote = match self.connection.client() {
            Ok(client) => client.remove_file(&path).await.map_err(|e| {
                warn!(path = %path, error = %e, "Remote delete failed");
                SyncError::from(e)
            }),
            Err(e) => Err(e),
        };
        Ok(Mirrored {
            value: removed,
            remote,
        })
    }

    /// Read the whole remote namespace into a fresh tree sharing the live root id.
    ///
    /// Unreadable subdirectories come back empty and unreadable files come
    /// back with empty content; only a failure to list the base itself fails
    /// the pull.
    pub async fn pull_all(&self) -> Result<VirtualTree> {
        let client = self.connection.client()?;
        let (root, base) = {
            let ws = self.workspace.read();
            (ws.root_id().clone(), ws.base_prefix().to_string())
        };

        self.begin();
        let entries = match walk(client.as_ref(), &base, WalkMode::Lenient).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(base = %base, error = %e, "Pull listing failed");
                self.finish(Some(e.to_string()));
                return Err(e.into());
            }
        };

        let reads = entries.iter().filter(|e| !e.is_dir).map(|entry| {
            let client = Arc::clone(&client);
            async move {
                match client.read_file(&entry.path).await {
                    Ok(content) => (entry.path.clone(), content),
                    Err(e) => {
                        warn!(path = %entry.path, error = %e, "Read failed; keeping file empty");
                        (entry.path.clone(), String::new())
                    }
                }
            }
        });
        let contents: HashMap<String, String> = join_all(reads).await.into_iter().collect();

        let tree = pull::build_tree(&root, &base, &entries, &contents);
        self.finish(tree.as_ref().err().map(|e| e.to_string()));
        let tree = tree?;
        info!(nodes = tree.len(), "Pulled remote tree");
        Ok(tree)
    }

    pub fn replace_with(&self, fresh: VirtualTree) -> Result<()> {
        merge::replace_into(&mut self.workspace.write(), fresh)
    }

    pub fn merge_with(&self, fresh: &VirtualTree) -> Result<MergeReport> {
        let report = merge::merge_into(&mut self.workspace.write(), fresh)?;
        debug!(
            inserted = report.inserted,
            updated = report.updated,
            "Merged pulled tree"
        );
        Ok(report)
    }

    /// Pull and merge, keeping local identity
    pub async fn sync_now(&self) -> Result<MergeReport> {
        let fresh = self.pull_all().await?;
        self.merge_with(&fresh)
    }

    /// Forward every change from `source` to `scheduler`
    pub fn follow(source: &dyn ChangeSource, scheduler: Arc<PullScheduler>) -> Subscription {
        source.subscribe(Arc::new(move |event: &ChangeEvent| {
            debug!(path = %event.path, kind = ?event.kind, "Remote change observed");
            scheduler.request();
        }))
    }
}
