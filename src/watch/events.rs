//! Change events and fingerprint diffing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// One observed change to a remote path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: String,
    pub is_directory: bool,
}

/// Cheap "did this path change" proxy. Not a content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingerprint {
    Directory,
    File { len: u64 },
}

impl Fingerprint {
    pub fn is_directory(&self) -> bool {
        matches!(self, Fingerprint::Directory)
    }
}

pub type FingerprintMap = BTreeMap<String, Fingerprint>;

/// Events turning `previous` into `current`: creations, then
/// modifications, then deletions, each in path order.
pub fn diff(previous: &FingerprintMap, current: &FingerprintMap) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (path, fp) in current {
        if !previous.contains_key(path) {
            events.push(ChangeEvent {
                kind: ChangeKind::Created,
                path: path.clone(),
                is_directory: fp.is_directory(),
            });
        }
    }
    for (path, fp) in current {
        if let Some(old) = previous.get(path) {
            if old != fp {
                events.push(ChangeEvent {
                    kind: ChangeKind::Modified,
                    path: path.clone(),
                    is_directory: fp.is_directory(),
                });
            }
        }
    }
    for (path, fp) in previous {
        if !current.contains_key(path) {
            events.push(ChangeEvent {
                kind: ChangeKind::Deleted,
                path: path.clone(),
                is_directory: fp.is_directory(),
            });
        }
    }

    events
}
