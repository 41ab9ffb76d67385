//! Build a fresh tree from a remote listing.

use crate::error::{Result, SyncError};
use crate::remote::WalkEntry;
use crate::tree::path::normalize_base;
use crate::tree::{Node, VirtualTree};
use crate::types::{IdMinter, NodeId};
use std::collections::HashMap;

/// Synthesize a tree from walk entries.
///
/// Every discovered path gets a fresh id from a minter scoped to this pass,
/// and each entry's parent is looked up by the id already assigned to its
/// parent path; the base prefix maps to `root`. Entries must list a
/// directory before anything below it. Files missing from `contents` come
/// out empty.
pub fn build_tree(
    root: &NodeId,
    base: &str,
    entries: &[WalkEntry],
    contents: &HashMap<String, String>,
) -> Result<VirtualTree> {
    let minter = IdMinter::for_pull_pass();
    let mut tree = VirtualTree::with_root(root.clone());
    let mut ids: HashMap<String, NodeId> = HashMap::new();
    ids.insert(normalize_base(base), root.clone());

    for entry in entries {
        let parent_id = ids.get(&entry.parent).cloned().ok_or_else(|| {
            SyncError::Structural(format!(
                "listing returned {} before its parent {}",
                entry.path, entry.parent
            ))
        })?;
        let id = minter.mint();
        let node = if entry.is_dir {
            Node::new_folder(id.clone(), parent_id, entry.name.clone())
        } else {
            let content = contents.get(&entry.path).cloned().unwrap_or_default();
            Node::new_file(id.clone(), parent_id, entry.name.clone(), content)
        };
        tree.insert_node(node)?;
        ids.insert(entry.path.clone(), id);
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn entry(path: &str, parent: &str, is_dir: bool) -> WalkEntry {
        WalkEntry {
            path: path.to_string(),
            parent: parent.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            is_dir,
            size: None,
        }
    }

    #[test]
    fn test_build_tree_links_parents_by_path() {
        let root = NodeId::new("root");
        let entries = vec![
            entry("/base/src", "/base", true),
            entry("/base/src/a.rs", "/base/src", false),
        ];
        let contents = HashMap::from([("/base/src/a.rs".to_string(), "fn a()".to_string())]);
        let tree = build_tree(&root, "/base/", &entries, &contents).unwrap();

        assert_eq!(tree.root_id(), &root);
        let paths = tree.paths("/base").unwrap();
        let file_id = &paths["/base/src/a.rs"];
        assert_eq!(tree.get(file_id).unwrap().content(), Some("fn a()"));
        assert!(tree.get(&paths["/base/src"]).unwrap().is_folder());
    }

    #[test]
    fn test_build_tree_rejects_child_before_parent() {
        let root = NodeId::new("root");
        let entries = vec![entry("/base/src/a.rs", "/base/src", false)];
        let err = build_tree(&root, "/base", &entries, &HashMap::new()).unwrap_err();
        assert!(matches!(err, SyncError::Structural(_)));
    }

    #[test]
    fn test_ids_and_paths_are_a_bijection() {
        let root = NodeId::new("root");
        let entries = vec![
            entry("/base/a", "/base", true),
            entry("/base/a/b", "/base/a", true),
            entry("/base/a/b/c.txt", "/base/a/b", false),
            entry("/base/a/d.txt", "/base/a", false),
            entry("/base/e.txt", "/base", false),
        ];
        let tree = build_tree(&root, "/base", &entries, &HashMap::new()).unwrap();
        let paths = tree.paths("/base").unwrap();
        assert_eq!(paths.len(), tree.len());
        let ids: HashSet<_> = paths.values().collect();
        assert_eq!(ids.len(), tree.len());
    }

    /// A parent-first listing: each step hangs a node under an earlier directory
    fn listing(steps: &[(usize, bool)]) -> (Vec<WalkEntry>, HashMap<String, String>) {
        let mut dirs = vec!["/base".to_string()];
        let mut entries = Vec::new();
        let mut contents = HashMap::new();
        for (i, (parent_pick, is_dir)) in steps.iter().enumerate() {
            let parent = dirs[parent_pick % dirs.len()].clone();
            let path = format!("{}/n{}", parent, i);
            entries.push(entry(&path, &parent, *is_dir));
            if *is_dir {
                dirs.push(path);
            } else {
                contents.insert(path, format!("content {}", i));
            }
        }
        (entries, contents)
    }

    proptest! {
        #[test]
        fn prop_every_listed_path_maps_to_one_node(
            steps in proptest::collection::vec((0usize..32, any::<bool>()), 0..40),
        ) {
            let root = NodeId::new("root");
            let (entries, contents) = listing(&steps);
            let tree = build_tree(&root, "/base", &entries, &contents).unwrap();

            prop_assert_eq!(tree.len(), entries.len() + 1);
            let paths = tree.paths("/base").unwrap();
            prop_assert_eq!(paths.len(), tree.len());
            let ids: HashSet<&NodeId> = paths.values().collect();
            prop_assert_eq!(ids.len(), tree.len());

            for listed in &entries {
                let id = paths.get(&listed.path);
                prop_assert!(id.is_some(), "missing {}", listed.path);
                let node = tree.get(id.unwrap()).unwrap();
                prop_assert_eq!(node.is_folder(), listed.is_dir);
                prop_assert_eq!(&tree.resolve_path("/base", &node.id).unwrap(), &listed.path);
                if !listed.is_dir {
                    prop_assert_eq!(node.content(), contents.get(&listed.path).map(String::as_str));
                }
            }
        }
    }
}
