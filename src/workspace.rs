//! Workspace domain: the tree plus open-file state, snapshots, and text formatting.

mod format;
mod open_files;
mod state;
mod types;

pub use format::{format_sessions_text, format_section_heading, format_snapshot_text};
pub use open_files::OpenFiles;
pub use state::Workspace;
pub use types::{SessionRow, SnapshotEntry, WorkspaceSnapshot};
