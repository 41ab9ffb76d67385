use sandsync::config::SandsyncConfig;
use sandsync::error::SyncError;
use sandsync::remote::MemoryRemote;
use sandsync::session::RecordingSurface;
use sandsync::sync::SyncStatus;
use sandsync::tooling::Sandbox;
use sandsync::tree::EntryKind;
use std::sync::Arc;

fn config() -> SandsyncConfig {
    let mut config = SandsyncConfig::default();
    config.remote.base_prefix = "/base".to_string();
    config
}

#[tokio::test]
async fn edits_mirror_after_connect_and_fail_softly_after_disconnect() {
    let sandbox = Sandbox::new(config()).unwrap();
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    sandbox.connect(remote.clone()).await.unwrap();

    let engine = sandbox.engine();
    let root = sandbox.workspace().read().root_id().clone();
    let created = engine
        .create(&root, "main.py", EntryKind::File)
        .await
        .unwrap();
    assert!(created.is_synced());
    let id = created.value.id.clone();
    let edited = engine.edit(&id, "print(1)").await.unwrap();
    assert!(edited.is_synced());
    assert_eq!(remote.file("/base/main.py"), Some("print(1)".to_string()));
    assert!(matches!(engine.status(), SyncStatus::Success { .. }));

    sandbox.disconnect().await;
    let offline = engine.edit(&id, "print(2)").await.unwrap();
    assert!(matches!(offline.remote, Err(SyncError::RemoteUnavailable)));
    let ws = sandbox.workspace();
    assert_eq!(
        ws.read().tree().get(&id).unwrap().content(),
        Some("print(2)")
    );
    assert_eq!(remote.file("/base/main.py"), Some("print(1)".to_string()));
}

#[tokio::test]
async fn disconnect_closes_every_session() {
    let sandbox = Sandbox::new(config()).unwrap();
    let remote = Arc::new(MemoryRemote::with_base("/base"));
    sandbox.connect(remote.clone()).await.unwrap();

    let sessions = sandbox.sessions();
    let first = sessions.create_session();
    let surface = Arc::new(RecordingSurface::new(80, 24));
    sessions.attach(&first, surface.clone()).await.unwrap();
    let second = sessions.create_session();
    sessions
        .attach(&second, Arc::new(RecordingSurface::new(80, 24)))
        .await
        .unwrap();
    assert_eq!(sessions.active(), Some(second));
    assert_eq!(remote.live_sessions(), 2);

    sandbox.disconnect().await;
    assert_eq!(remote.live_sessions(), 0);
    assert!(sessions.is_empty());
    assert!(surface.is_disposed());
    assert_eq!(sessions.active(), None);
}
