//! Sandsync: Sandbox File-Tree Reconciliation
//!
//! Keeps an in-memory virtual file tree mirrored into a remote sandbox,
//! polls the sandbox for changes made behind the tree's back, and
//! multiplexes terminal sessions whose prompts trigger reconciliation pulls.

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod session;
pub mod sync;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod watch;
pub mod workspace;
