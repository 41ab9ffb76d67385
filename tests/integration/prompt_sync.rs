use parking_lot::RwLock;
use sandsync::config::SessionsConfig;
use sandsync::remote::{MemoryRemote, RemoteCall, RemoteConnection, SessionHandle};
use sandsync::session::{RecordingSurface, SessionMultiplexer};
use sandsync::sync::{PullScheduler, SyncEngine};
use sandsync::types::SessionId;
use sandsync::workspace::Workspace;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    remote: Arc<MemoryRemote>,
    engine: Arc<SyncEngine>,
    mux: SessionMultiplexer,
    _scheduler: Arc<PullScheduler>,
}

fn harness(settings: SessionsConfig) -> Harness {
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    let connection = Arc::new(RemoteConnection::connected(remote.clone()));
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&connection),
        Arc::new(RwLock::new(Workspace::new("/base"))),
    ));
    let scheduler = PullScheduler::new(Arc::clone(&engine), Duration::from_millis(50));
    scheduler.start();
    let mux = SessionMultiplexer::new(
        connection,
        Arc::clone(&engine),
        Arc::clone(&scheduler),
        &settings,
    )
    .unwrap();
    Harness {
        remote,
        engine,
        mux,
        _scheduler: scheduler,
    }
}

async fn open_session(h: &Harness) -> (SessionId, SessionHandle) {
    let id = h.mux.create_session();
    let handle = h
        .mux
        .attach(&id, Arc::new(RecordingSurface::new(80, 24)))
        .await
        .unwrap();
    (id, handle)
}

fn pulls(remote: &MemoryRemote) -> usize {
    remote
        .calls()
        .iter()
        .filter(|c| matches!(c, RemoteCall::List(p) if p == "/base"))
        .count()
}

#[tokio::test(start_paused = true)]
async fn finished_command_pulls_what_it_built() {
    let h = harness(SessionsConfig::default());
    let (id, handle) = open_session(&h).await;

    h.mux.send_keys(&id, b"make\r").await.unwrap();
    h.remote.put_file("/base/build/app", "binary");
    h.remote.emit_output(handle, b"make: done\r\n\x1b[32muser@box\x1b[0m:~$ \x1b[0m");

    tokio::time::sleep(Duration::from_millis(1400)).await;
    assert_eq!(pulls(&h.remote), 0);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(pulls(&h.remote), 1);

    let ws = h.engine.workspace();
    assert!(ws
        .read()
        .tree()
        .find_by_path("/base", "/base/build/app")
        .unwrap()
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn repeated_prompts_pull_once_from_the_last_match() {
    let h = harness(SessionsConfig::default());
    let (_id, handle) = open_session(&h).await;

    h.remote.emit_output(handle, b"$ ");
    tokio::time::sleep(Duration::from_millis(1000)).await;
    h.remote.emit_output(handle, b"$ ");

    tokio::time::sleep(Duration::from_millis(1400)).await;
    assert_eq!(pulls(&h.remote), 0);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(pulls(&h.remote), 1);
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(pulls(&h.remote), 1);
}

#[tokio::test(start_paused = true)]
async fn configured_prompt_pattern_is_honoured() {
    let settings = SessionsConfig {
        extra_prompt_patterns: vec![r"READY%\s*$".to_string()],
        debounce_ms: 200,
        ..SessionsConfig::default()
    };
    let h = harness(settings);
    let (_id, handle) = open_session(&h).await;

    h.remote.emit_output(handle, b"compiling...\r\n");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(pulls(&h.remote), 0);

    h.remote.emit_output(handle, b"READY% ");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(pulls(&h.remote), 1);
    assert_eq!(h.mux.prompt_matches(), 1);
}

#[tokio::test(start_paused = true)]
async fn closing_a_session_cancels_its_pending_pull() {
    let h = harness(SessionsConfig::default());
    let (id, handle) = open_session(&h).await;

    h.remote.emit_output(handle, b"$ ");
    h.mux.close_session(&id).await.unwrap();
    assert!(h.remote.is_killed(handle));
    assert!(!h.remote.emit_output(handle, b"$ "));

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(pulls(&h.remote), 0);
}
