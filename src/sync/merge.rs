//! Path-keyed merge of a pulled tree into the live workspace.
//!
//! Remote content wins on a matching path; local identity (and with it the
//! open tabs and active file) is kept. Paths only present remotely are
//! inserted with their pulled ids. Nothing is ever removed or moved, so a
//! remote rename shows up as a new path next to the old one.

use crate::error::{Result, SyncError};
use crate::tree::{Node, NodeKind, VirtualTree};
use crate::types::NodeId;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Counters from one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Paths where local and remote disagree on file vs folder
    pub kind_conflicts: Vec<String>,
    /// Pulled nodes dropped because they sit below a kind conflict
    pub skipped: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }
}

/// Merge `fresh` into `workspace`.
///
/// The merge is staged on a copy of the tree and swapped in only when every
/// node applied, so a failure leaves the workspace untouched. A path that is
/// a file on one side and a folder on the other keeps the local node, and
/// everything pulled below it is skipped.
pub fn merge_into(workspace: &mut Workspace, fresh: &VirtualTree) -> Result<MergeReport> {
    let base = workspace.base_prefix().to_string();
    let local_by_path = workspace.tree().paths(&base)?;

    // Visit fresh nodes parent-first: a path sorts before its extensions.
    let mut fresh_nodes: Vec<(String, &Node)> = Vec::with_capacity(fresh.len());
    for node in fresh.non_root_nodes() {
        fresh_nodes.push((fresh.resolve_path(&base, &node.id)?, node));
    }
    fresh_nodes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut staged = workspace.tree().clone();

    // fresh id -> id the node lives under locally
    let mut adopted: HashMap<NodeId, NodeId> = HashMap::new();
    adopted.insert(fresh.root_id().clone(), workspace.root_id().clone());
    let mut conflicted: HashSet<NodeId> = HashSet::new();

    let mut report = MergeReport::default();
    for (path, node) in fresh_nodes {
        if node
            .parent_id
            .as_ref()
            .is_some_and(|p| conflicted.contains(p))
        {
            conflicted.insert(node.id.clone());
            report.skipped += 1;
            continue;
        }

        match local_by_path.get(&path) {
            Some(local_id) => {
                let local = staged
                    .get_mut(local_id)
                    .ok_or_else(|| SyncError::NodeNotFound(local_id.clone()))?;
                if overwrite_content(local, node, &mut report) {
                    adopted.insert(node.id.clone(), local_id.clone());
                } else {
                    warn!(path = %path, "Local and remote disagree on node kind; keeping local");
                    report.kind_conflicts.push(path);
                    conflicted.insert(node.id.clone());
                }
            }
            None => {
                let parent = node
                    .parent_id
                    .as_ref()
                    .and_then(|p| adopted.get(p))
                    .cloned()
                    .ok_or_else(|| {
                        SyncError::Structural(format!("no local parent for pulled path {}", path))
                    })?;
                let mut inserted = node.clone();
                inserted.parent_id = Some(parent);
                staged.insert_node(inserted)?;
                adopted.insert(node.id.clone(), node.id.clone());
                report.inserted += 1;
            }
        }
    }

    *workspace.tree_mut() = staged;
    Ok(report)
}

/// Adopt remote content; false when the kinds disagree
fn overwrite_content(local: &mut Node, fresh: &Node, report: &mut MergeReport) -> bool {
    match (&mut local.kind, &fresh.kind) {
        (NodeKind::File { content }, NodeKind::File { content: remote }) => {
            if content == remote {
                report.unchanged += 1;
            } else {
                *content = remote.clone();
                report.updated += 1;
            }
            true
        }
        (NodeKind::Folder { .. }, NodeKind::Folder { .. }) => {
            report.unchanged += 1;
            true
        }
        _ => false,
    }
}

/// Swap the whole tree for `fresh`, dropping open/active state
pub fn replace_into(workspace: &mut Workspace, fresh: VirtualTree) -> Result<()> {
    workspace.replace_tree(fresh)
}
