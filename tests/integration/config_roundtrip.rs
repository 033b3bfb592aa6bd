//! Config file load/save through the public API.

use ctxsync::SyncConfig;
use ctxsync::config::{StoreBackend, StoreConfig};

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.toml");

    let mut config = SyncConfig::default();
    config.durable_sync = false;
    config.log_level = "debug".to_owned();
    config.dispatch.triggers = 3;
    config.store = StoreConfig {
        backend: StoreBackend::Fs,
        dir: Some(dir.path().join("session")),
    };
    config.save_to_file(&path).unwrap();

    let loaded = SyncConfig::from_file(&path).unwrap();
    assert!(!loaded.durable_sync);
    assert_eq!(loaded.log_level, "debug");
    assert_eq!(loaded.dispatch.triggers, 3);
    assert_eq!(loaded.dispatch.period_secs, 60);
    assert_eq!(loaded.store.backend, StoreBackend::Fs);
    assert_eq!(loaded.store.effective_dir(), dir.path().join("session"));
}

#[test]
fn partial_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[dispatch]\nperiod_secs = 30\n").unwrap();

    let loaded = SyncConfig::from_file(&path).unwrap();
    assert!(loaded.durable_sync);
    assert_eq!(loaded.dispatch.period_secs, 30);
    assert_eq!(loaded.dispatch.triggers, 6);
}

#[test]
fn zero_triggers_rejected_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[dispatch]\ntriggers = 0\n").unwrap();

    let err = SyncConfig::from_file(&path).unwrap_err();
    assert!(err.is_configuration());
}
