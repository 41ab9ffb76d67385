//! Shared types for workspace snapshots and session listings.

use crate::tree::EntryKind;
use crate::types::{NodeId, SessionId};
use serde::{Deserialize, Serialize};

/// Flattened view of the workspace tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub base_prefix: String,
    pub node_count: usize,
    pub open_count: usize,
    pub entries: Vec<SnapshotEntry>,
}

/// One node in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: NodeId,
    pub path: String,
    pub kind: EntryKind,
    /// Content length for files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub open: bool,
    pub active: bool,
}

/// One row of the session listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: SessionId,
    pub display_name: String,
    pub state: String,
    pub active: bool,
}
