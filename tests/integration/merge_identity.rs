use parking_lot::RwLock;
use sandsync::remote::{MemoryRemote, RemoteConnection};
use sandsync::sync::SyncEngine;
use sandsync::tree::EntryKind;
use sandsync::workspace::Workspace;
use std::sync::Arc;

#[tokio::test]
async fn merge_keeps_local_identity_and_open_state() {
    let mut ws = Workspace::new("/base");
    let root = ws.root_id().clone();
    let readme = ws.create(&root, "readme.md", EntryKind::File).unwrap().id;
    ws.update(&readme, "old").unwrap();
    ws.open(&readme).unwrap();

    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.put_file("/base/readme.md", "new");
    remote.put_dir("/base/docs");
    remote.put_file("/base/docs/guide.md", "guide");

    let engine = SyncEngine::new(
        Arc::new(RemoteConnection::connected(remote)),
        Arc::new(RwLock::new(ws)),
    );
    let fresh = engine.pull_all().await.unwrap();
    let fresh_id = fresh
        .find_by_path("/base", "/base/readme.md")
        .unwrap()
        .unwrap();
    assert_ne!(fresh_id, readme);

    let report = engine.merge_with(&fresh).unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 2);

    let ws = engine.workspace();
    let ws = ws.read();
    let node = ws.tree().get(&readme).unwrap();
    assert_eq!(node.content(), Some("new"));
    assert_eq!(ws.active(), Some(&readme));
    assert!(ws.open_files().contains(&readme));
    assert_eq!(
        ws.tree().find_by_path("/base", "/base/readme.md").unwrap(),
        Some(readme.clone())
    );
    assert!(ws
        .tree()
        .find_by_path("/base", "/base/docs/guide.md")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn merging_twice_converges_on_the_same_content() {
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.put_dir("/base/a");
    remote.put_file("/base/a/one.txt", "1");
    remote.put_file("/base/two.txt", "2");

    let engine = SyncEngine::new(
        Arc::new(RemoteConnection::connected(remote)),
        Arc::new(RwLock::new(Workspace::new("/base"))),
    );
    let fresh = engine.pull_all().await.unwrap();
    engine.merge_with(&fresh).unwrap();
    let once = engine.workspace().read().snapshot().unwrap();

    let second = engine.merge_with(&fresh).unwrap();
    assert!(!second.changed());
    let twice = engine.workspace().read().snapshot().unwrap();

    let view = |s: &sandsync::workspace::WorkspaceSnapshot| {
        s.entries
            .iter()
            .map(|e| (e.path.clone(), e.size))
            .collect::<Vec<_>>()
    };
    assert_eq!(view(&once), view(&twice));
}

#[tokio::test]
async fn replace_discards_open_files() {
    let mut ws = Workspace::new("/base");
    let root = ws.root_id().clone();
    let note = ws.create(&root, "note.txt", EntryKind::File).unwrap().id;
    ws.open(&note).unwrap();

    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.put_file("/base/note.txt", "remote");
    let engine = SyncEngine::new(
        Arc::new(RemoteConnection::connected(remote)),
        Arc::new(RwLock::new(ws)),
    );
    let fresh = engine.pull_all().await.unwrap();
    engine.replace_with(fresh).unwrap();

    let ws = engine.workspace();
    let ws = ws.read();
    assert!(ws.open_files().is_empty());
    assert_eq!(ws.active(), None);
    assert!(ws.tree().get(&note).is_none());
}

#[tokio::test]
async fn remote_folder_over_local_file_does_not_stall_reconciliation() {
    let mut ws = Workspace::new("/base");
    let root = ws.root_id().clone();
    let a = ws.create(&root, "a.txt", EntryKind::File).unwrap().id;
    ws.update(&a, "old").unwrap();
    ws.create(&root, "build", EntryKind::File).unwrap();

    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.put_file("/base/a.txt", "new");
    remote.put_file("/base/build/out.txt", "artifact");
    remote.put_file("/base/zzz.txt", "z");

    let engine = SyncEngine::new(
        Arc::new(RemoteConnection::connected(remote)),
        Arc::new(RwLock::new(ws)),
    );
    let first = engine.sync_now().await.unwrap();
    assert_eq!(first.kind_conflicts, vec!["/base/build".to_string()]);
    assert_eq!(first.skipped, 1);
    let second = engine.sync_now().await.unwrap();
    assert!(!second.changed());

    let ws = engine.workspace();
    let ws = ws.read();
    assert_eq!(ws.tree().get(&a).unwrap().content(), Some("new"));
    assert!(ws
        .tree()
        .find_by_path("/base", "/base/zzz.txt")
        .unwrap()
        .is_some());
    assert!(ws
        .tree()
        .find_by_path("/base", "/base/build/out.txt")
        .unwrap()
        .is_none());
}
