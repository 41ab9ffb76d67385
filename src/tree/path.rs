//! Remote path derivation for tree nodes.
//!
//! Paths are never stored. A node's path is the base prefix followed by the
//! names of its ancestors (root excluded) and its own name, joined by `/`.
//! Two nodes denote the same remote object iff their derived paths are equal.

use crate::error::{Result, SyncError};
use crate::tree::node::Node;
use crate::types::NodeId;
use std::collections::{HashMap, HashSet};

/// Join a child name onto a remote path
pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Normalize a base prefix: absolute, no trailing slash (except "/")
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Parent path and final segment of a remote path
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let idx = path.rfind('/')?;
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Some((parent, &path[idx + 1..]))
}

/// Walk parent pointers from `id` to the root and build its path.
///
/// A cycle or a dangling parent pointer aborts with `StructuralError`
/// instead of looping.
pub(crate) fn resolve(nodes: &HashMap<NodeId, Node>, base: &str, id: &NodeId) -> Result<String> {
    let mut names = Vec::new();
    let mut visited = HashSet::new();
    let mut current = nodes
        .get(id)
        .ok_or_else(|| SyncError::NodeNotFound(id.clone()))?;

    loop {
        if !visited.insert(current.id.clone()) {
            return Err(SyncError::Structural(format!(
                "cycle detected while resolving path of {}",
                id
            )));
        }
        match &current.parent_id {
            None => break,
            Some(parent_id) => {
                names.push(current.name.as_str());
                current = nodes.get(parent_id).ok_or_else(|| {
                    SyncError::Structural(format!(
                        "node {} points at missing parent {}",
                        current.id, parent_id
                    ))
                })?;
            }
        }
    }

    let base = normalize_base(base);
    if names.is_empty() {
        return Ok(base);
    }
    names.reverse();
    Ok(join(&base, &names.join("/")))
}
