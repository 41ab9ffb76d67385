use parking_lot::RwLock;
use proptest::prelude::*;
use sandsync::remote::{MemoryRemote, RemoteCall, RemoteConnection};
use sandsync::sync::SyncEngine;
use sandsync::tree::EntryKind;
use sandsync::workspace::Workspace;
use std::sync::Arc;

fn engine(remote: Arc<MemoryRemote>, workspace: Workspace) -> SyncEngine {
    SyncEngine::new(
        Arc::new(RemoteConnection::connected(remote)),
        Arc::new(RwLock::new(workspace)),
    )
}

#[tokio::test]
async fn push_all_creates_folder_then_writes_file() {
    let mut ws = Workspace::new("/base");
    let root = ws.root_id().clone();
    let src = ws.create(&root, "src", EntryKind::Folder).unwrap().id;
    let index = ws.create(&src, "index.ts", EntryKind::File).unwrap().id;
    ws.update(&index, "a").unwrap();

    let remote = Arc::new(MemoryRemote::with_base("/base"));
    let report = engine(remote.clone(), ws).push_all().await.unwrap();

    assert!(report.is_complete());
    assert_eq!(
        remote.calls(),
        vec![
            RemoteCall::MakeDir("/base/src".to_string()),
            RemoteCall::WriteFile {
                path: "/base/src/index.ts".to_string(),
                content: "a".to_string(),
            },
        ]
    );
    assert_eq!(remote.file("/base/src/index.ts"), Some("a".to_string()));
}

#[tokio::test]
async fn failed_file_write_does_not_abort_the_batch() {
    let mut ws = Workspace::new("/base");
    let root = ws.root_id().clone();
    let lib = ws.create(&root, "lib", EntryKind::Folder).unwrap().id;
    ws.create(&lib, "x.rs", EntryKind::File).unwrap();
    ws.create(&root, "top.txt", EntryKind::File).unwrap();

    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.fail_write("/base/lib/x.rs");
    let engine = engine(remote.clone(), ws);
    let report = engine.push_all().await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "/base/lib/x.rs");
    assert!(remote.file("/base/top.txt").is_some());
}

#[tokio::test]
async fn failed_folder_does_not_abort_the_batch() {
    let mut ws = Workspace::new("/base");
    let root = ws.root_id().clone();
    let lib = ws.create(&root, "lib", EntryKind::Folder).unwrap().id;
    ws.create(&lib, "x.rs", EntryKind::File).unwrap();
    let docs = ws.create(&root, "docs", EntryKind::Folder).unwrap().id;
    ws.create(&docs, "guide.md", EntryKind::File).unwrap();
    ws.create(&root, "top.txt", EntryKind::File).unwrap();

    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.fail_make_dir("/base/lib");
    let engine = engine(remote.clone(), ws);
    let report = engine.push_all().await.unwrap();

    // The folder and the file beneath it both fail; everything else lands
    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 3);
    let mut failed: Vec<&str> = report.failed.iter().map(|(p, _)| p.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["/base/lib", "/base/lib/x.rs"]);
    assert!(!remote.is_dir("/base/lib"));
    assert!(remote.is_dir("/base/docs"));
    assert!(remote.file("/base/docs/guide.md").is_some());
    assert!(remote.file("/base/top.txt").is_some());
}

/// Build a random nested tree from (depth, name) pairs
fn build(shape: &[(usize, u8)]) -> Workspace {
    let mut ws = Workspace::new("/base");
    let mut stack = vec![ws.root_id().clone()];
    for (i, (depth, kind)) in shape.iter().enumerate() {
        let level = (*depth).min(stack.len() - 1);
        stack.truncate(level + 1);
        let parent = stack[level].clone();
        if kind % 2 == 0 {
            let id = ws
                .create(&parent, &format!("d{}", i), EntryKind::Folder)
                .unwrap()
                .id;
            stack.push(id);
        } else {
            let id = ws
                .create(&parent, &format!("f{}", i), EntryKind::File)
                .unwrap()
                .id;
            ws.update(&id, format!("content {}", i)).unwrap();
        }
    }
    ws
}

proptest! {
    #[test]
    fn no_write_precedes_its_parent_make_dir(shape in prop::collection::vec((0usize..4, any::<u8>()), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let remote = Arc::new(MemoryRemote::with_base("/base"));
        let report = rt
            .block_on(engine(remote.clone(), build(&shape)).push_all())
            .unwrap();
        prop_assert!(report.is_complete());

        let calls = remote.calls();
        for (i, call) in calls.iter().enumerate() {
            let path = match call {
                RemoteCall::WriteFile { path, .. } => path,
                RemoteCall::MakeDir(path) => path,
                _ => continue,
            };
            let parent = &path[..path.rfind('/').unwrap()];
            if parent == "/base" {
                continue;
            }
            let made = calls[..i]
                .iter()
                .any(|c| matches!(c, RemoteCall::MakeDir(p) if p == parent));
            prop_assert!(made, "{} issued before its parent", path);
        }
    }
}
