use parking_lot::{Mutex, RwLock};
use sandsync::remote::{MemoryRemote, RemoteConnection};
use sandsync::sync::{PullScheduler, SyncEngine};
use sandsync::watch::{ChangeEvent, ChangeKind, ChangeSource, RemotePoller};
use sandsync::workspace::Workspace;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn unchanged_file_is_silent_across_ticks() {
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    remote.put_file("/base/a", "x");
    remote.put_file("/base/b", "y");
    let poller = RemotePoller::new(
        Arc::new(RemoteConnection::connected(remote.clone())),
        "/base",
        Duration::from_secs(2),
    );
    poller.tick().await.unwrap();

    remote.remove("/base/b");
    remote.put_file("/base/c", "z");
    let events = poller.tick().await.unwrap();

    let mut seen: Vec<(ChangeKind, &str)> =
        events.iter().map(|e| (e.kind, e.path.as_str())).collect();
    seen.sort_by(|a, b| a.1.cmp(b.1));
    assert_eq!(
        seen,
        vec![
            (ChangeKind::Deleted, "/base/b"),
            (ChangeKind::Created, "/base/c"),
        ]
    );
}

#[tokio::test]
async fn unsubscribed_callbacks_stop_receiving() {
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    let poller = RemotePoller::new(
        Arc::new(RemoteConnection::connected(remote.clone())),
        "/base",
        Duration::from_secs(2),
    );
    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    let subscription = poller.subscribe(Arc::new(move |_: &ChangeEvent| {
        *sink.lock() += 1;
    }));

    remote.put_file("/base/one", "1");
    poller.tick().await.unwrap();
    assert_eq!(*count.lock(), 1);

    subscription.unsubscribe();
    remote.put_file("/base/two", "2");
    poller.tick().await.unwrap();
    assert_eq!(*count.lock(), 1);
}

#[tokio::test(start_paused = true)]
async fn followed_poller_merges_remote_edits() {
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    let connection = Arc::new(RemoteConnection::connected(remote.clone()));
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&connection),
        Arc::new(RwLock::new(Workspace::new("/base"))),
    ));
    let scheduler = PullScheduler::new(Arc::clone(&engine), Duration::from_millis(50));
    scheduler.start();
    let poller = RemotePoller::new(connection, "/base", Duration::from_millis(500));
    let _follow = SyncEngine::follow(&poller, Arc::clone(&scheduler));

    remote.put_file("/base/out/bundle.js", "console.log(1)");
    remote.put_file("/base/out/bundle.map", "{}");
    poller.start();
    tokio::time::sleep(Duration::from_millis(700)).await;

    // Three created events, one pull
    assert_eq!(scheduler.completed_pulls(), 1);
    let ws = engine.workspace();
    let ws = ws.read();
    let id = ws
        .tree()
        .find_by_path("/base", "/base/out/bundle.js")
        .unwrap()
        .expect("merged");
    assert_eq!(ws.tree().get(&id).unwrap().content(), Some("console.log(1)"));
    drop(ws);
    poller.stop();
}
