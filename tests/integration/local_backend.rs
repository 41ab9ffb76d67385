use sandsync::config::SandsyncConfig;
use sandsync::remote::{LocalSandbox, RemoteClient};
use sandsync::tooling::{import_directory, Sandbox};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> SandsyncConfig {
    let mut config = SandsyncConfig::default();
    config.remote.base_prefix = "/home/dev".to_string();
    config.remote.shell = "/bin/sh".to_string();
    config
}

#[tokio::test]
async fn imported_directory_round_trips_through_a_local_sandbox() {
    let project = TempDir::new().unwrap();
    fs::create_dir_all(project.path().join("pkg/inner")).unwrap();
    fs::write(project.path().join("pkg/inner/lib.rs"), "pub fn f() {}").unwrap();
    fs::write(project.path().join("Cargo.toml"), "[package]").unwrap();

    let root = TempDir::new().unwrap();
    let client: Arc<dyn RemoteClient> =
        Arc::new(LocalSandbox::open(root.path(), "/home/dev", "/bin/sh").unwrap());

    let workspace = import_directory(project.path(), "/home/dev").unwrap();
    let sandbox = Sandbox::with_workspace(config(), workspace).unwrap();
    let report = sandbox.connect(Arc::clone(&client)).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded, 4);
    assert_eq!(
        fs::read_to_string(root.path().join("home/dev/pkg/inner/lib.rs")).unwrap(),
        "pub fn f() {}"
    );

    // A command changes the sandbox behind the tree's back
    let output = client
        .run_command("echo generated > pkg/out.txt", false)
        .await
        .unwrap();
    assert_eq!(output.exit_code, Some(0));

    let report = sandbox.sessions().sync_now().await.unwrap();
    assert_eq!(report.inserted, 1);
    let ws = sandbox.workspace();
    let id = ws
        .read()
        .tree()
        .find_by_path("/home/dev", "/home/dev/pkg/out.txt")
        .unwrap()
        .unwrap();
    assert_eq!(
        ws.read().tree().get(&id).unwrap().content(),
        Some("generated\n")
    );
    sandbox.disconnect().await;
}
