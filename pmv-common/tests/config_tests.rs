//! Unit tests for configuration resolution and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PMV_TEST_CONFIG or PMV_TEST_NUMBER are marked with
//! #[serial] so they run sequentially.

use pmv_common::config::{env_override, load_toml, ConfigResolver, LoggingConfig};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    logging: LoggingConfig,
    threshold: f64,
}

#[test]
#[serial]
fn test_cli_argument_takes_priority() {
    env::set_var("PMV_TEST_CONFIG", "/tmp/from-env.toml");

    let resolver = ConfigResolver::new("PMV_TEST_CONFIG", "sample.toml");
    let resolved = resolver.resolve(Some(PathBuf::from("/tmp/from-cli.toml").as_path()));

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var("PMV_TEST_CONFIG");
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var("PMV_TEST_CONFIG", "/tmp/from-env.toml");

    let resolver = ConfigResolver::new("PMV_TEST_CONFIG", "sample.toml");
    assert_eq!(resolver.resolve(None), Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var("PMV_TEST_CONFIG");
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let config: SampleConfig = load_toml(Some(missing.as_path())).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_no_path_uses_defaults() {
    let config: SampleConfig = load_toml(None).unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.threshold, 0.0);
}

#[test]
fn test_valid_file_is_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sample.toml");
    std::fs::write(&path, "threshold = 0.9\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config: SampleConfig = load_toml(Some(path.as_path())).unwrap();
    assert_eq!(config.threshold, 0.9);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "threshold = [not toml").unwrap();

    let result: pmv_common::Result<SampleConfig> = load_toml(Some(path.as_path()));
    assert!(matches!(result, Err(pmv_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_env_override_parses_and_ignores_garbage() {
    env::set_var("PMV_TEST_NUMBER", "0.42");
    assert_eq!(env_override::<f64>("PMV_TEST_NUMBER"), Some(0.42));

    env::set_var("PMV_TEST_NUMBER", "not-a-number");
    assert_eq!(env_override::<f64>("PMV_TEST_NUMBER"), None);

    env::remove_var("PMV_TEST_NUMBER");
    assert_eq!(env_override::<f64>("PMV_TEST_NUMBER"), None);
}
