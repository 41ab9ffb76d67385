//! Core identifier types shared by the tree, the sync engine and the session multiplexer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// NodeId: opaque identifier of a node in the virtual file tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// SessionId: identifier of one multiplexed terminal session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic id source with a fixed prefix.
///
/// Ids are unique for the lifetime of the minter, which is all a tree or a
/// single pull pass needs. No wall clock or randomness is involved.
#[derive(Debug)]
pub struct IdMinter {
    prefix: String,
    next: AtomicU64,
}

static PULL_PASSES: AtomicU64 = AtomicU64::new(1);

impl IdMinter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Minter scoped to one pull pass: `p<pass>-<n>`
    pub fn for_pull_pass() -> Self {
        let pass = PULL_PASSES.fetch_add(1, Ordering::Relaxed);
        Self::new(format!("p{}-", pass))
    }

    pub fn mint(&self) -> NodeId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        NodeId(format!("{}{}", self.prefix, n))
    }

    pub fn mint_session(&self) -> (SessionId, u64) {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        (SessionId(format!("{}{}", self.prefix, n)), n)
    }
}
