//! Virtual File Tree
//!
//! In-memory hierarchical namespace of the local workspace. Pure data and
//! structural operations; no I/O. The root is always a folder and the only
//! node without a parent. Parent pointers are fixed at creation, so cycles
//! and orphans can only appear through a bug, and path resolution guards
//! against them anyway.

pub mod node;
pub mod path;

pub use node::{EntryKind, Node, NodeKind};

use crate::error::{Result, SyncError};
use crate::types::{IdMinter, NodeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Default id of a freshly created root
pub const ROOT_ID: &str = "root";

/// In-memory file tree keyed by node id
#[derive(Debug, Clone)]
pub struct VirtualTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    minter: Arc<IdMinter>,
}

impl Default for VirtualTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualTree {
    pub fn new() -> Self {
        Self::with_root(NodeId::new(ROOT_ID))
    }

    /// Create an empty tree whose root carries the given id.
    ///
    /// Pulled trees use the live root id so they can be merged or swapped in
    /// without remapping top-level parents.
    pub fn with_root(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            Node {
                id: root.clone(),
                parent_id: None,
                name: String::new(),
                kind: NodeKind::Folder { expanded: true },
            },
        );
        Self {
            nodes,
            root,
            minter: Arc::new(IdMinter::new("n")),
        }
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn non_root_nodes(&self) -> impl Iterator<Item = &Node> {
        let root = self.root.clone();
        self.nodes.values().filter(move |n| n.id != root)
    }

    pub fn non_root_ids(&self) -> Vec<NodeId> {
        self.non_root_nodes().map(|n| n.id.clone()).collect()
    }

    /// Create a node under `parent_id`.
    ///
    /// Sibling names are not checked: two siblings with the same name can
    /// coexist and will collide on the remote side.
    pub fn create(&mut self, parent_id: &NodeId, name: &str, kind: EntryKind) -> Result<Node> {
        self.require_folder(parent_id)?;
        validate_name(name)?;

        let id = self.minter.mint();
        let node = match kind {
            EntryKind::File => Node::new_file(id.clone(), parent_id.clone(), name, ""),
            EntryKind::Folder => Node::new_folder(id.clone(), parent_id.clone(), name),
        };
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    /// Insert a fully formed node, used by pull and merge.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        let parent_id = node.parent_id.as_ref().ok_or_else(|| {
            SyncError::Structural(format!("node {} has no parent", node.id))
        })?;
        match self.nodes.get(parent_id) {
            Some(parent) if parent.is_folder() => {}
            Some(_) => {
                return Err(SyncError::Structural(format!(
                    "parent {} of {} is not a folder",
                    parent_id, node.id
                )))
            }
            None => {
                return Err(SyncError::Structural(format!(
                    "parent {} of {} does not exist",
                    parent_id, node.id
                )))
            }
        }
        if self.nodes.contains_key(&node.id) {
            return Err(SyncError::Structural(format!(
                "node id {} already present",
                node.id
            )));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Children of a folder: folders first, then by name
    pub fn children(&self, parent_id: &NodeId) -> Vec<&Node> {
        let mut children: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.as_ref() == Some(parent_id))
            .collect();
        children.sort_by(|a, b| presentation_order(a, b));
        children
    }

    /// Replace a file's content
    pub fn update(&mut self, id: &NodeId, content: impl Into<String>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| SyncError::NodeNotFound(id.clone()))?;
        match &mut node.kind {
            NodeKind::File { content: current } => {
                *current = content.into();
                Ok(())
            }
            NodeKind::Folder { .. } => Err(SyncError::InvalidOperation(format!(
                "cannot set content on folder {}",
                id
            ))),
        }
    }

    /// Flip a folder's expanded flag; returns the new value
    pub fn toggle(&mut self, id: &NodeId) -> Result<bool> {
        let expanded = self.folder_flag(id)?;
        *expanded = !*expanded;
        Ok(*expanded)
    }

    pub fn expand(&mut self, id: &NodeId) -> Result<()> {
        *self.folder_flag(id)? = true;
        Ok(())
    }

    /// Transitive descendants of `id`, breadth first, excluding `id`
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut by_parent: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
        for node in self.nodes.values() {
            if let Some(parent) = &node.parent_id {
                by_parent.entry(parent).or_default().push(&node.id);
            }
        }

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = by_parent.get(current) {
                for child in children {
                    if seen.insert(*child) {
                        out.push((*child).clone());
                        queue.push_back(child);
                    }
                }
            }
        }
        out
    }

    /// Remove `id` and all of its descendants.
    ///
    /// The removal set is computed before anything is touched, so either the
    /// whole subtree goes or nothing does. Returns exactly the removed ids,
    /// with `id` first.
    pub fn delete_subtree(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        if *id == self.root {
            return Err(SyncError::InvalidOperation(
                "the root cannot be deleted".to_string(),
            ));
        }
        if !self.nodes.contains_key(id) {
            return Err(SyncError::NodeNotFound(id.clone()));
        }

        let mut removed = vec![id.clone()];
        removed.extend(self.descendants(id));
        for node_id in &removed {
            self.nodes.remove(node_id);
        }
        Ok(removed)
    }

    /// Remote path of a node under `base`
    pub fn resolve_path(&self, base: &str, id: &NodeId) -> Result<String> {
        path::resolve(&self.nodes, base, id)
    }

    /// Path of every node, root included, keyed by path.
    ///
    /// When siblings share a name the last one visited wins; callers that
    /// care about collisions should check `len()` against the map size.
    pub fn paths(&self, base: &str) -> Result<BTreeMap<String, NodeId>> {
        let mut out = BTreeMap::new();
        for id in self.nodes.keys() {
            out.insert(self.resolve_path(base, id)?, id.clone());
        }
        Ok(out)
    }

    pub fn find_by_path(&self, base: &str, target: &str) -> Result<Option<NodeId>> {
        for id in self.nodes.keys() {
            if self.resolve_path(base, id)? == target {
                return Ok(Some(id.clone()));
            }
        }
        Ok(None)
    }

    /// Drop every non-root node and take the non-root nodes of `fresh`.
    ///
    /// `fresh` must share this tree's root id.
    pub fn replace_non_root(&mut self, fresh: VirtualTree) -> Result<()> {
        if fresh.root != self.root {
            return Err(SyncError::Structural(format!(
                "replacement tree root {} does not match {}",
                fresh.root, self.root
            )));
        }
        let root = self
            .nodes
            .remove(&self.root)
            .ok_or_else(|| SyncError::Structural("tree has no root".to_string()))?;
        let mut nodes = fresh.nodes;
        nodes.insert(root.id.clone(), root);
        self.nodes = nodes;
        Ok(())
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    fn require_folder(&self, id: &NodeId) -> Result<()> {
        match self.nodes.get(id) {
            Some(node) if node.is_folder() => Ok(()),
            Some(_) => Err(SyncError::InvalidOperation(format!(
                "{} is a file and cannot hold children",
                id
            ))),
            None => Err(SyncError::NodeNotFound(id.clone())),
        }
    }

    fn folder_flag(&mut self, id: &NodeId) -> Result<&mut bool> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| SyncError::NodeNotFound(id.clone()))?;
        match &mut node.kind {
            NodeKind::Folder { expanded } => Ok(expanded),
            NodeKind::File { .. } => Err(SyncError::InvalidOperation(format!(
                "{} is a file and cannot be expanded",
                id
            ))),
        }
    }
}

/// Folder before file, then lexicographic by name
pub fn presentation_order(a: &Node, b: &Node) -> Ordering {
    match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(SyncError::InvalidOperation(format!(
            "invalid node name {:?}",
            name
        )));
    }
    if name.contains('/') {
        return Err(SyncError::InvalidOperation(format!(
            "node name {:?} must not contain '/'",
            name
        )));
    }
    Ok(())
}
