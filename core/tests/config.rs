//! Configuration defaults, JSON loading, and validation.

use chrono::Weekday;
use soma_core::{config::SomaConfig, store::snapshot::SnapshotBackend};
use tempfile::TempDir;

/// Defaults describe the Wednesday weekly feed.
#[test]
fn defaults_are_valid() {
    let config = SomaConfig::default();
    config.validate().unwrap();
    assert_eq!(config.anchor().unwrap(), Weekday::Wed);
    assert_eq!(config.retries, 3);
    assert_eq!(config.tolerance().allowed(100.0), 1_000.0);
    assert_eq!(config.tolerance().allowed(1_000_000.0), 5_000.0);
}

/// Missing keys keep their defaults.
#[test]
fn load_partial_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("soma.json");
    std::fs::write(&path, r#"{ "retries": 5, "snapshot_backend": "disabled", "data_dir": "out" }"#).unwrap();

    let config = SomaConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.retries, 5);
    assert_eq!(config.snapshot_backend, SnapshotBackend::Disabled);
    assert_eq!(config.data_dir, std::path::PathBuf::from("out"));
    assert_eq!(config.backoff, 1.5);
}

/// Out-of-range values are rejected, at load time too.
#[test]
fn invalid_values_are_rejected() {
    assert!(SomaConfig { retries: 0, ..SomaConfig::default() }.validate().is_err());
    assert!(SomaConfig { backoff: 0.5, ..SomaConfig::default() }.validate().is_err());
    assert!(SomaConfig { anchor_weekday: 7, ..SomaConfig::default() }.validate().is_err());
    assert!(SomaConfig { abs_tolerance: -1.0, ..SomaConfig::default() }.validate().is_err());

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "anchor_weekday": 9 }"#).unwrap();
    assert!(SomaConfig::load(path.to_str().unwrap()).is_err());
}
