//! Tests for config file loading

use hindsight::config::{Config, ConfigError};
use hindsight::scheduler::RefreshTimezone;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_example_config_parses() {
    let config = Config::from_file(Path::new("config.example.toml"))
        .expect("config.example.toml should parse");

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.refresh.day_offset_minutes, 120);
    assert_eq!(config.limits.windows.len(), 3);
    assert_eq!(config.candidates.len(), 3);
    assert_eq!(config.candidates[0].id(), "WIKI/AAPL");

    // The shipped example leaves the key blank
    assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));
}

#[test]
fn test_from_file_with_named_timezone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hindsight.toml");
    std::fs::write(
        &path,
        r#"
        [source]
        api_key = "k"

        [refresh]
        timezone = "Europe/Berlin"
        day_offset_minutes = 90

        [backup]
        path = "/tmp/hindsight-cache"
        "#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert!(config.validate().is_ok());
    assert!(matches!(config.timezone(), Ok(RefreshTimezone::Named(_))));
    assert_eq!(config.backup_store().path(), Path::new("/tmp/hindsight-cache"));
    // Candidates fall back to the built-in list
    assert!(!config.candidates.is_empty());
}

#[test]
fn test_from_file_missing() {
    let err = Config::from_file(Path::new("does-not-exist.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_from_file_invalid_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = ").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML config file"));
}

#[test]
fn test_unknown_log_format_rejected() {
    let mut config = Config::default();
    config.source.api_key = String::from("k");
    config.logging.format = String::from("xml");

    assert_eq!(
        config.validate(),
        Err(ConfigError::InvalidLogFormat(String::from("xml")))
    );
}
