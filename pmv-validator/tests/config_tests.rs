//! Validator configuration loading
//!
//! Tests that set PMV_* variables are marked #[serial].

use pmv_validator::ValidatorConfig;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_overrides() {
    for name in [
        "PMV_CONFIG",
        "PMV_AUTO_CORRECT_THRESHOLD",
        "PMV_VERIFIER_TIMEOUT_MS",
        "PMV_HISTORY_LIMIT",
        "PMV_LOG_LEVEL",
    ] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_file_values_then_env_overrides() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("validator.toml");
    fs::write(
        &path,
        r#"
        [logging]
        level = "debug"

        [pipeline]
        auto_correct_threshold = 0.9
        history_limit = 20

        [facts]
        verifier_timeout_ms = 4000
        "#,
    )
    .unwrap();

    env::set_var("PMV_HISTORY_LIMIT", "7");
    let config = ValidatorConfig::load(Some(&path)).unwrap();
    clear_overrides();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.pipeline.auto_correct_threshold, 0.9);
    assert_eq!(config.pipeline.history_limit, 7);
    assert_eq!(config.facts.verifier_timeout_ms, 4000);
    assert_eq!(config.pipeline.max_batch_size, 50);
}

#[test]
#[serial]
fn test_env_var_locates_config_file() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[pipeline]\nbatch_concurrency = 4\n").unwrap();

    env::set_var("PMV_CONFIG", &path);
    let config = ValidatorConfig::load(None).unwrap();
    clear_overrides();

    assert_eq!(config.pipeline.batch_concurrency, 4);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let config = ValidatorConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, ValidatorConfig::default());
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[calibration]\nthreshold_min = 0.99\nthreshold_max = 0.9\n").unwrap();
    assert!(ValidatorConfig::load(Some(&path)).is_err());

    env::set_var("PMV_AUTO_CORRECT_THRESHOLD", "1.7");
    let result = ValidatorConfig::load(Some(&dir.path().join("absent.toml")));
    clear_overrides();
    assert!(result.is_err());
}
