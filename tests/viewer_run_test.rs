//! Integration tests: configuration to a running viewer.

use gx_core::{DeviceSdk, SessionState};
use gx_driver_mock::MockSdk;
use gx_viewer::config::ViewerConfig;
use gx_viewer::{HeadlessSurface, Viewer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn create_test_config(dir: &Path) -> ViewerConfig {
    let toml_str = format!(
        r#"
        [application]
        name = "gx-viewer test"
        log_level = "warn"

        [acquisition]
        dequeue_timeout_ms = 50
        show_interval_ms = 10
        frame_rate_interval_ms = 40

        [[sessions]]
        device_index = 1
        snapshot_path = "{dir}/cam0.png"

        [[sessions]]
        device_index = 2
        snapshot_path = "{dir}/cam1.png"

        [mock]
        mode = "realistic"
        seed = 3

        [[mock.devices]]
        serial_number = "T1"
        width = 64
        height = 48
        frame_interval_ms = 4

        [[mock.devices]]
        serial_number = "T2"
        width = 64
        height = 48
        pixel_format = "bayer_gb8"
        frame_interval_ms = 4
        frame_loss_rate = 0.2
        "#,
        dir = dir.display()
    );
    toml::from_str(&toml_str).expect("Failed to parse test config")
}

#[test]
fn test_shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/gx-viewer.toml");
    let config = ViewerConfig::load_from(&path).expect("Failed to load shipped config");
    config.validate().expect("Shipped config is invalid");
    assert_eq!(config.sessions.len(), 2);
    assert_eq!(config.mock.devices.len(), 2);
}

#[tokio::test]
async fn test_configured_viewer_streams_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    config.validate().unwrap();

    let sdk = Arc::new(MockSdk::from_config(&config.mock));
    let dyn_sdk: Arc<dyn DeviceSdk> = sdk.clone();
    let mut viewer = Viewer::new(dyn_sdk, config.acquisition.clone());

    let listed = viewer.list_devices().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].display_name, "MER-Mock(T1)");

    for session in &config.sessions {
        viewer.add_session(session, HeadlessSurface::default()).unwrap();
    }

    let summary = viewer
        .run(
            tokio::time::sleep(Duration::from_millis(200)),
            Some(Duration::from_millis(50)),
        )
        .await;

    let [mono, bayer] = summary.sessions.as_slice() else {
        panic!("expected two sessions, got {:?}", summary.sessions);
    };
    assert!(mono.stats.acquired > 0);
    assert_eq!(mono.stats.incomplete, 0);
    assert!(bayer.stats.acquired > 0);
    assert!(bayer.stats.incomplete > 0, "frame loss is simulated at 20%");
    assert_eq!(mono.snapshots_saved, 1);
    assert_eq!(bayer.snapshots_saved, 1);
    assert!(dir.path().join("cam0.png").exists());
    assert!(dir.path().join("cam1.png").exists());

    viewer.shutdown().unwrap();
    assert!(viewer
        .session(mono.id)
        .is_some_and(|s| s.state() == SessionState::Closed));
    assert!(!sdk.device(1).unwrap().is_open());
}

#[test]
fn test_shutdown_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let sdk: Arc<dyn DeviceSdk> = Arc::new(MockSdk::from_config(&config.mock));
    let mut viewer = Viewer::new(sdk, config.acquisition.clone());
    viewer
        .add_session(&config.sessions[0], HeadlessSurface::default())
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    viewer.shutdown().unwrap();
    viewer.shutdown().unwrap();
}
