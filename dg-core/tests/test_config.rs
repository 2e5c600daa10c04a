//! Integration tests for application configuration.
//!
//! Tests saving and reloading from TOML, defaults for missing sections,
//! persisting the device address through `ConfigHandle`, and address parsing.

use dg_core::config::{AppConfig, ConfigHandle, Environment, TargetAddress};
use dg_core::error::DgError;
use tempfile::TempDir;

// ---- File round-trips ----

#[test]
fn save_and_reload_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.server.address = "192.168.1.40:9000".into();
    config.reconnect.max_attempts = 3;
    config.logging.json_output = true;
    config.save_to_file(&path).unwrap();

    let loaded = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.server.address, "192.168.1.40:9000");
    assert_eq!(loaded.reconnect.max_attempts, 3);
    assert_eq!(loaded.reconnect.base_delay_ms, 1_000);
    assert!(loaded.logging.json_output);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server]\naddress = \"door.local\"\n").unwrap();

    let config = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(config.server.address, "door.local");
    assert_eq!(config.server.environment, Environment::Development);
    assert_eq!(config.reconnect.max_delay_ms, 10_000);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server\naddress = ").unwrap();

    assert!(matches!(AppConfig::load_from_file(&path), Err(DgError::Config(_))));
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = AppConfig::load_from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(DgError::Io(_))));
}

// ---- Persisted address ----

#[tokio::test]
async fn save_address_persists_under_server_address() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let handle = ConfigHandle::with_path(AppConfig::default(), path.clone());

    handle.save_address("  10.0.0.7:8765 ").await.unwrap();

    assert_eq!(handle.read().await.server.address, "10.0.0.7:8765");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[server]"));
    assert!(contents.contains("address = \"10.0.0.7:8765\""));

    let reloaded = AppConfig::load_from_file(&path).unwrap();
    assert_eq!(reloaded.target().unwrap().url(), "ws://10.0.0.7:8765");
}

#[tokio::test]
async fn save_address_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = AppConfig::default();
    config.server.address = "door.local".into();
    let handle = ConfigHandle::with_path(config, path.clone());

    let result = handle.save_address("door.local:notaport").await;

    assert!(matches!(result, Err(DgError::InvalidAddress(_))));
    assert_eq!(handle.read().await.server.address, "door.local");
    assert!(!path.exists());
}

#[tokio::test]
async fn handle_clones_share_state() {
    let handle = ConfigHandle::new(AppConfig::default());
    let other = handle.clone();

    other.write().await.server.address = "door.local".into();

    assert!(handle.read().await.is_server_configured());
}

// ---- Address parsing ----

#[test]
fn urls_and_bare_hosts_resolve() {
    let cases = [
        ("door.local", Environment::Development, "ws://door.local:8765"),
        ("door.local", Environment::Production, "wss://door.local:8765"),
        ("ws://10.0.0.2:9000/", Environment::Production, "ws://10.0.0.2:9000"),
        ("https://door.example.com/ws", Environment::Development, "wss://door.example.com:8765"),
        ("[fe80::1]:8000", Environment::Development, "ws://[fe80::1]:8000"),
    ];
    for (input, env, url) in cases {
        assert_eq!(TargetAddress::parse(input, env).unwrap().url(), url, "input {input}");
    }
}

#[test]
fn empty_and_hostless_addresses_are_rejected() {
    for input in ["", "   ", "ws://", ":8765", "host:99999"] {
        assert!(
            TargetAddress::parse(input, Environment::Development).is_err(),
            "input {input:?} should be rejected"
        );
    }
}
