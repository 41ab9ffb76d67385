//! Workspace state: the virtual tree together with open-file bookkeeping.

use super::open_files::OpenFiles;
use super::types::{SnapshotEntry, WorkspaceSnapshot};
use crate::error::{Result, SyncError};
use crate::tree::path::normalize_base;
use crate::tree::{EntryKind, Node, VirtualTree};
use crate::types::NodeId;
use std::collections::HashSet;

/// Single-writer local state owned by the sync engine
#[derive(Debug, Clone)]
pub struct Workspace {
    tree: VirtualTree,
    open: OpenFiles,
    base_prefix: String,
}

impl Workspace {
    pub fn new(base_prefix: &str) -> Self {
        Self::with_tree(base_prefix, VirtualTree::new())
    }

    pub fn with_tree(base_prefix: &str, tree: VirtualTree) -> Self {
        Self {
            tree,
            open: OpenFiles::new(),
            base_prefix: normalize_base(base_prefix),
        }
    }

    pub fn tree(&self) -> &VirtualTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut VirtualTree {
        &mut self.tree
    }

    pub fn open_files(&self) -> &OpenFiles {
        &self.open
    }

    pub(crate) fn open_files_mut(&mut self) -> &mut OpenFiles {
        &mut self.open
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    pub fn root_id(&self) -> &NodeId {
        self.tree.root_id()
    }

    pub fn path_of(&self, id: &NodeId) -> Result<String> {
        self.tree.resolve_path(&self.base_prefix, id)
    }

    pub fn create(&mut self, parent_id: &NodeId, name: &str, kind: EntryKind) -> Result<Node> {
        self.tree.create(parent_id, name, kind)
    }

    pub fn update(&mut self, id: &NodeId, content: impl Into<String>) -> Result<()> {
        self.tree.update(id, content)
    }

    pub fn toggle(&mut self, id: &NodeId) -> Result<bool> {
        self.tree.toggle(id)
    }

    pub fn expand(&mut self, id: &NodeId) -> Result<()> {
        self.tree.expand(id)
    }

    /// Open a file in a tab and make it active
    pub fn open(&mut self, id: &NodeId) -> Result<()> {
        let node = self
            .tree
            .get(id)
            .ok_or_else(|| SyncError::NodeNotFound(id.clone()))?;
        if !node.is_file() {
            return Err(SyncError::InvalidOperation(format!(
                "{} is a folder and cannot be opened",
                id
            )));
        }
        self.open.open(id.clone());
        Ok(())
    }

    pub fn close(&mut self, id: &NodeId) {
        self.open.close(id);
    }

    pub fn activate(&mut self, id: &NodeId) -> Result<()> {
        if self.open.activate(id) {
            Ok(())
        } else {
            Err(SyncError::InvalidOperation(format!("{} is not open", id)))
        }
    }

    pub fn active(&self) -> Option<&NodeId> {
        self.open.active()
    }

    /// Cascading delete: the subtree leaves the tree and the open-file set
    /// in one step. Returns the removed ids.
    pub fn delete(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        let removed = self.tree.delete_subtree(id)?;
        let set: HashSet<NodeId> = removed.iter().cloned().collect();
        self.open.remove_all(&set);
        Ok(removed)
    }

    /// Swap in a freshly pulled tree, discarding open/active state
    pub fn replace_tree(&mut self, fresh: VirtualTree) -> Result<()> {
        self.tree.replace_non_root(fresh)?;
        self.open.clear();
        Ok(())
    }

    /// Flattened, path-sorted view for display and JSON output
    pub fn snapshot(&self) -> Result<WorkspaceSnapshot> {
        let mut entries = Vec::new();
        for node in self.tree.non_root_nodes() {
            entries.push(SnapshotEntry {
                id: node.id.clone(),
                path: self.path_of(&node.id)?,
                kind: node.entry_kind(),
                size: node.content().map(|c| c.len() as u64),
                open: self.open.contains(&node.id),
                active: self.open.active() == Some(&node.id),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(WorkspaceSnapshot {
            base_prefix: self.base_prefix.clone(),
            node_count: entries.len(),
            open_count: self.open.len(),
            entries,
        })
    }
}
