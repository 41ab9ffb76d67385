//! Recursive listing of the remote namespace, shared by pull and the poller.

use super::RemoteClient;
use crate::error::RemoteError;
use crate::tree::path::join;
use tracing::warn;

/// How a failed listing below the root is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Any listing failure aborts the walk
    Strict,
    /// Failures below the root are logged and the directory is treated as empty
    Lenient,
}

/// One discovered remote path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub parent: String,
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
}

/// List `root` recursively.
///
/// A directory always precedes everything below it. Siblings are sorted
/// by name.
pub async fn walk(
    client: &dyn RemoteClient,
    root: &str,
    mode: WalkMode,
) -> Result<Vec<WalkEntry>, RemoteError> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_string()];

    while let Some(dir) = stack.pop() {
        let mut entries = match client.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir != root && mode == WalkMode::Lenient => {
                warn!(path = %dir, error = %e, "Skipping unreadable remote directory");
                continue;
            }
            Err(e) => return Err(e),
        };
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut subdirs = Vec::new();
        for entry in entries {
            let path = join(&dir, &entry.name);
            if entry.is_dir {
                subdirs.push(path.clone());
            }
            out.push(WalkEntry {
                path,
                parent: dir.clone(),
                name: entry.name,
                is_dir: entry.is_dir,
                size: entry.size,
            });
        }
        // Reverse so the stack pops subdirectories in name order
        stack.extend(subdirs.into_iter().rev());
    }

    Ok(out)
}
