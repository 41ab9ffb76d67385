//! Virtual file tree node types

use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// Node kind; content only exists on files, expansion only on folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    File { content: String },
    Folder { expanded: bool },
}

impl NodeKind {
    pub fn file() -> Self {
        NodeKind::File {
            content: String::new(),
        }
    }

    pub fn folder() -> Self {
        NodeKind::Folder { expanded: false }
    }
}

/// Kind selector used by creation APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

/// Tree element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// None only for the root
    pub parent_id: Option<NodeId>,
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new_file(
        id: NodeId,
        parent_id: NodeId,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            name: name.into(),
            kind: NodeKind::File {
                content: content.into(),
            },
        }
    }

    pub fn new_folder(id: NodeId, parent_id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            name: name.into(),
            kind: NodeKind::folder(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    pub fn entry_kind(&self) -> EntryKind {
        match self.kind {
            NodeKind::File { .. } => EntryKind::File,
            NodeKind::Folder { .. } => EntryKind::Folder,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Folder { .. } => None,
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { expanded: true })
    }
}
