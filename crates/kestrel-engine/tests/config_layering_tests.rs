//! Configuration Layering Tests
//!
//! Defaults, TOML file and environment overrides feeding `EngineConfig`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::PathBuf;

use kestrel_core::logging_facility::Profile;
use kestrel_core::{FailoverStrategy, KestrelError, ModelType, MutableModelFailover};
use kestrel_engine::{EngineConfig, SnapshotConfig};
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> config::Map<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_file_values_round_trip() {
    // GIVEN a config file written from a fully populated config
    let dir = TempDir::new().unwrap();
    let expected = EngineConfig {
        model_type: ModelType::Mutable,
        mutable_model_failover: MutableModelFailover::CompensatingActions,
        logging: Profile::Production,
        snapshot: SnapshotConfig {
            dir: Some(dir.path().join("snapshots")),
            every: 500,
        },
    };
    let path = dir.path().join("engine.toml");
    fs::write(&path, toml::to_string(&expected).unwrap()).unwrap();

    // WHEN it is loaded without overrides
    let loaded = EngineConfig::load_with_env(Some(&path), env(&[])).unwrap();

    // THEN every value comes from the file
    assert_eq!(loaded, expected);
    assert_eq!(loaded.failover(), FailoverStrategy::Compensation);
}

#[test]
fn test_partial_file_keeps_defaults() {
    // GIVEN a file setting only the snapshot interval
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    fs::write(&path, "[snapshot]\nevery = 10\n").unwrap();

    // WHEN it is loaded
    let loaded = EngineConfig::load_with_env(Some(&path), env(&[])).unwrap();

    // THEN everything else is default
    assert_eq!(loaded.snapshot.every, 10);
    assert_eq!(loaded.snapshot.dir, None);
    assert_eq!(loaded.model_type, ModelType::Immutable);
    assert_eq!(loaded.logging, Profile::Development);
}

#[test]
fn test_environment_overrides_file() {
    // GIVEN a file choosing compensation and a snapshot directory
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    fs::write(
        &path,
        "model_type = \"mutable\"\nmutable_model_failover = \"compensating_actions\"\n\n[snapshot]\ndir = \"/from/file\"\nevery = 3\n",
    )
    .unwrap();

    // WHEN the environment switches failover and directory
    let loaded = EngineConfig::load_with_env(
        Some(&path),
        env(&[
            ("KESTREL__MUTABLE_MODEL_FAILOVER", "snapshots"),
            ("KESTREL__SNAPSHOT__DIR", "/from/env"),
        ]),
    )
    .unwrap();

    // THEN environment values win and untouched file values stay
    assert_eq!(loaded.failover(), FailoverStrategy::SnapshotRollback);
    assert_eq!(loaded.snapshot.dir, Some(PathBuf::from("/from/env")));
    assert_eq!(loaded.snapshot.every, 3);
}

#[test]
fn test_unrelated_environment_is_ignored() {
    let loaded = EngineConfig::load_with_env(
        None,
        env(&[("OTHER__MODEL_TYPE", "mutable"), ("PATH", "/usr/bin")]),
    )
    .unwrap();

    assert_eq!(loaded, EngineConfig::default());
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    fs::write(&path, "model_type = [unterminated").unwrap();

    let err = EngineConfig::load_with_env(Some(&path), env(&[])).unwrap_err();

    assert!(matches!(err, KestrelError::Config { .. }), "{:?}", err);
}
