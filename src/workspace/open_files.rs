//! Open-file set and active file.

use crate::types::NodeId;
use std::collections::HashSet;

/// Ordered set of open file ids (tab order) plus the active one.
///
/// The active id, when set, is always an element of the set.
#[derive(Debug, Clone, Default)]
pub struct OpenFiles {
    order: Vec<NodeId>,
    /// Most recent open/activation last
    recency: Vec<NodeId>,
    active: Option<NodeId>,
}

impl OpenFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn active(&self) -> Option<&NodeId> {
        self.active.as_ref()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.order.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Open (or re-focus) a file and make it active
    pub fn open(&mut self, id: NodeId) {
        if !self.order.contains(&id) {
            self.order.push(id.clone());
        }
        self.touch(&id);
        self.active = Some(id);
    }

    /// Make an already open file active; returns false if it is not open
    pub fn activate(&mut self, id: &NodeId) -> bool {
        if !self.order.contains(id) {
            return false;
        }
        self.touch(id);
        self.active = Some(id.clone());
        true
    }

    pub fn close(&mut self, id: &NodeId) {
        self.remove_all(&HashSet::from([id.clone()]));
    }

    /// Drop every id in `removed`; if the active file went away, activity
    /// falls back to the most recently opened remaining file.
    pub fn remove_all(&mut self, removed: &HashSet<NodeId>) {
        self.order.retain(|id| !removed.contains(id));
        self.recency.retain(|id| !removed.contains(id));
        let active_gone = self
            .active
            .as_ref()
            .map(|id| removed.contains(id))
            .unwrap_or(false);
        if active_gone {
            self.active = self.recency.last().cloned();
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.recency.clear();
        self.active = None;
    }

    fn touch(&mut self, id: &NodeId) {
        self.recency.retain(|existing| existing != id);
        self.recency.push(id.clone());
    }
}
