//! Integration tests for configuration loader
//!
//! Tests loading worker configurations from files on disk.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use spool_domain::{SpoolError, WaitStrategy};
use spool_infra::config;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Test loading a TOML worker configuration
///
/// # Test Steps
/// 1. Write a TOML document overriding every field
/// 2. Load it by path
/// 3. Verify the values, durations read as milliseconds
#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "spool.toml",
        r#"
name = "thumbnailer"
wait_strategy = "LinearWaitLong"
break_threshold = 8
break_duration = 45000
termination_timeout = 3000
requeue_delay = 500
open_circuit_retry_delay = 250
"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config.name, "thumbnailer");
    assert_eq!(config.wait_strategy, WaitStrategy::LinearWaitLong);
    assert_eq!(config.break_threshold, 8);
    assert_eq!(config.break_duration, Duration::from_secs(45));
    assert_eq!(config.termination_timeout, Duration::from_secs(3));
    assert_eq!(config.requeue_delay, Duration::from_millis(500));
    assert_eq!(config.open_circuit_retry_delay, Duration::from_millis(250));
}

/// Test loading a partial JSON worker configuration
///
/// # Test Steps
/// 1. Write a JSON document with only a name and a strategy
/// 2. Load it by path
/// 3. Verify the named fields and the defaults for the rest
#[test]
fn test_load_partial_config_from_json_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", r#"{"name":"exporter","wait_strategy":"ShortWait"}"#);

    let config = config::load_from_file(Some(path)).unwrap();

    assert_eq!(config.name, "exporter");
    assert_eq!(config.wait_strategy, WaitStrategy::ShortWait);
    assert_eq!(config.break_threshold, 5);
    assert_eq!(config.break_duration, Duration::from_secs(60));
    assert_eq!(config.requeue_delay, Duration::from_secs(1));
}

#[test]
fn test_unknown_strategy_in_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "spool.toml", r#"wait_strategy = "Eventually""#);

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(matches!(&err, SpoolError::Config(m) if m.contains("Eventually")), "{err}");
}

#[test]
fn test_loaded_file_is_validated() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "spool.json", r#"{"break_duration":0}"#);

    let err = config::load_from_file(Some(path)).unwrap_err();
    assert!(matches!(&err, SpoolError::Config(m) if m.contains("break_duration")), "{err}");
}

#[test]
fn test_malformed_and_unsupported_files() {
    let dir = TempDir::new().unwrap();

    let broken = write(&dir, "spool.json", r#"{ "name": "#);
    assert!(matches!(config::load_from_file(Some(broken)), Err(SpoolError::Config(_))));

    let yaml = write(&dir, "spool.yaml", "name: worker");
    let err = config::load_from_file(Some(yaml)).unwrap_err();
    assert!(err.to_string().contains("Unsupported"), "{err}");

    let missing = dir.path().join("absent.toml");
    assert!(matches!(config::load_from_file(Some(missing)), Err(SpoolError::Config(_))));
}
