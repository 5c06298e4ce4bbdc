//! Worker configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when `SPOOL_WORKER_NAME` is set
//! 2. Otherwise the first configuration file found by
//!    [`probe_config_paths`]
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `SPOOL_WORKER_NAME`: worker name (required for the environment path)
//! - `SPOOL_WAIT_STRATEGY`: wait strategy name, e.g. `CappedLinearWait`
//! - `SPOOL_BREAK_THRESHOLD`: consecutive failures before the circuit opens
//! - `SPOOL_BREAK_DURATION_MS`: how long the circuit stays open
//! - `SPOOL_TERMINATION_TIMEOUT_MS`: upper bound on `stop`
//! - `SPOOL_REQUEUE_DELAY_MS`: pause before a requeued item is re-added
//! - `SPOOL_OPEN_CIRCUIT_RETRY_DELAY_MS`: delay between open-circuit probes
//!
//! Unset optional variables keep their defaults. A set but unparsable
//! variable is an error, never a silent default.
//!
//! ## File Locations
//! `spool.toml`, `spool.json`, `config.toml` and `config.json` are probed in
//! the working directory and its two parents, then next to the executable.
//! Files hold a flat `WorkerConfig` document; durations are milliseconds.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use spool_domain::{Result, SpoolError, WaitStrategy, WorkerConfig};

const WORKER_NAME: &str = "SPOOL_WORKER_NAME";
const WAIT_STRATEGY: &str = "SPOOL_WAIT_STRATEGY";
const BREAK_THRESHOLD: &str = "SPOOL_BREAK_THRESHOLD";
const BREAK_DURATION_MS: &str = "SPOOL_BREAK_DURATION_MS";
const TERMINATION_TIMEOUT_MS: &str = "SPOOL_TERMINATION_TIMEOUT_MS";
const REQUEUE_DELAY_MS: &str = "SPOOL_REQUEUE_DELAY_MS";
const OPEN_CIRCUIT_RETRY_DELAY_MS: &str = "SPOOL_OPEN_CIRCUIT_RETRY_DELAY_MS";

const FILE_NAMES: [&str; 4] = ["spool.toml", "spool.json", "config.toml", "config.json"];

/// Load a worker configuration, environment first, then file
///
/// The file is only consulted when `SPOOL_WORKER_NAME` is unset. Once the
/// name is present, any error on the environment path is returned as-is.
///
/// # Errors
/// Returns `SpoolError::Config` when the selected source does not yield a
/// valid configuration.
pub fn load() -> Result<WorkerConfig> {
    load_with(|key| std::env::var(key).ok(), None)
}

fn load_with<F>(lookup: F, file: Option<PathBuf>) -> Result<WorkerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(WORKER_NAME).is_none() {
        tracing::debug!("{WORKER_NAME} not set, loading configuration from file");
        return load_from_file(file);
    }

    let config = from_lookup(lookup)?;
    tracing::info!(worker = %config.name, "Worker configuration loaded from environment");
    Ok(config)
}

/// Load a worker configuration from `SPOOL_*` environment variables
///
/// # Errors
/// Returns `SpoolError::Config` if `SPOOL_WORKER_NAME` is missing, a set
/// variable cannot be parsed, or the result fails validation.
pub fn load_from_env() -> Result<WorkerConfig> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load a worker configuration from a file
///
/// With `None`, the first file found by [`probe_config_paths`] is used. The
/// format follows the extension: `.toml` or `.json`.
///
/// # Errors
/// Returns `SpoolError::Config` if the file is missing or unreadable, the
/// format is unsupported or malformed, or the result fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<WorkerConfig> {
    let config_path = match path {
        Some(p) if p.is_file() => p,
        Some(p) => {
            return Err(SpoolError::config(format!("Config file not found: {}", p.display())));
        }
        None => probe_config_paths().ok_or_else(|| {
            SpoolError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading worker configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        SpoolError::config(format!("Failed to read {}: {e}", config_path.display()))
    })?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// First existing configuration file in the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe) = std::env::current_exe() {
        dirs.extend(exe.parent().map(Path::to_path_buf));
    }

    first_existing(&dirs)
}

fn first_existing(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn parse_config(contents: &str, path: &Path) -> Result<WorkerConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(contents)
            .map_err(|e| SpoolError::config(format!("Invalid TOML in {}: {e}", path.display()))),
        Some("json") => serde_json::from_str(contents)
            .map_err(|e| SpoolError::config(format!("Invalid JSON in {}: {e}", path.display()))),
        other => Err(SpoolError::config(format!(
            "Unsupported config format '{}' for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

/// Build a configuration from any variable source
fn from_lookup<F>(lookup: F) -> Result<WorkerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let name = lookup(WORKER_NAME).ok_or_else(|| {
        SpoolError::config(format!("Missing required environment variable: {WORKER_NAME}"))
    })?;
    let mut config = WorkerConfig::named(name);

    if let Some(raw) = lookup(WAIT_STRATEGY) {
        config.wait_strategy = WaitStrategy::from_str(&raw)
            .map_err(|e| SpoolError::config(format!("Invalid {WAIT_STRATEGY}: {e}")))?;
    }
    if let Some(raw) = lookup(BREAK_THRESHOLD) {
        config.break_threshold = parse_number(BREAK_THRESHOLD, &raw)?;
    }
    if let Some(raw) = lookup(BREAK_DURATION_MS) {
        config.break_duration = parse_millis(BREAK_DURATION_MS, &raw)?;
    }
    if let Some(raw) = lookup(TERMINATION_TIMEOUT_MS) {
        config.termination_timeout = parse_millis(TERMINATION_TIMEOUT_MS, &raw)?;
    }
    if let Some(raw) = lookup(REQUEUE_DELAY_MS) {
        config.requeue_delay = parse_millis(REQUEUE_DELAY_MS, &raw)?;
    }
    if let Some(raw) = lookup(OPEN_CIRCUIT_RETRY_DELAY_MS) {
        config.open_circuit_retry_delay = parse_millis(OPEN_CIRCUIT_RETRY_DELAY_MS, &raw)?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_number<N: FromStr>(key: &str, raw: &str) -> Result<N>
where
    N::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| SpoolError::config(format!("Invalid {key} '{raw}': {e}")))
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    parse_number::<u64>(key, raw).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use parking_lot::Mutex;
    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    /// Validates a fully specified variable set.
    ///
    /// Assertions:
    /// - Every variable lands in its field, durations in milliseconds.
    #[test]
    fn test_from_lookup_all_vars_set() {
        let config = from_lookup(vars(&[
            (WORKER_NAME, "thumbnailer"),
            (WAIT_STRATEGY, "cappedLinearWait"),
            (BREAK_THRESHOLD, "3"),
            (BREAK_DURATION_MS, "15000"),
            (TERMINATION_TIMEOUT_MS, "2500"),
            (REQUEUE_DELAY_MS, " 250 "),
            (OPEN_CIRCUIT_RETRY_DELAY_MS, "100"),
        ]))
        .unwrap();

        assert_eq!(config.name, "thumbnailer");
        assert_eq!(config.wait_strategy, WaitStrategy::CappedLinearWait);
        assert_eq!(config.break_threshold, 3);
        assert_eq!(config.break_duration, Duration::from_secs(15));
        assert_eq!(config.termination_timeout, Duration::from_millis(2500));
        assert_eq!(config.requeue_delay, Duration::from_millis(250));
        assert_eq!(config.open_circuit_retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_from_lookup_only_name_uses_defaults() {
        let config = from_lookup(vars(&[(WORKER_NAME, "mailer")])).unwrap();
        assert_eq!(config, WorkerConfig::named("mailer"));
    }

    /// Validates failures on the environment path.
    ///
    /// Assertions:
    /// - Missing name, unknown strategy, non-numeric and zero values are
    ///   config errors naming the variable.
    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let missing = from_lookup(vars(&[])).unwrap_err();
        assert!(matches!(&missing, SpoolError::Config(m) if m.contains(WORKER_NAME)));

        let unknown = from_lookup(vars(&[(WORKER_NAME, "w"), (WAIT_STRATEGY, "Forever")]));
        assert!(matches!(unknown, Err(SpoolError::Config(m)) if m.contains(WAIT_STRATEGY)));

        let garbled = from_lookup(vars(&[(WORKER_NAME, "w"), (BREAK_THRESHOLD, "five")]));
        assert!(matches!(garbled, Err(SpoolError::Config(m)) if m.contains(BREAK_THRESHOLD)));

        let negative = from_lookup(vars(&[(WORKER_NAME, "w"), (REQUEUE_DELAY_MS, "-1")]));
        assert!(matches!(negative, Err(SpoolError::Config(_))));

        let zero = from_lookup(vars(&[(WORKER_NAME, "w"), (BREAK_THRESHOLD, "0")]));
        assert!(matches!(zero, Err(SpoolError::Config(_))));
    }

    /// Validates the process-environment entry point.
    ///
    /// Assertions:
    /// - Values set in the process environment are picked up.
    /// - Removing the name makes the environment path fail.
    #[test]
    fn test_load_from_env_reads_process_environment() {
        let _guard = ENV_LOCK.lock();

        std::env::set_var(WORKER_NAME, "env-worker");
        std::env::set_var(BREAK_THRESHOLD, "7");
        let loaded = load_from_env();
        std::env::remove_var(WORKER_NAME);
        std::env::remove_var(BREAK_THRESHOLD);

        let config = loaded.unwrap();
        assert_eq!(config.name, "env-worker");
        assert_eq!(config.break_threshold, 7);

        assert!(matches!(load_from_env(), Err(SpoolError::Config(_))));
    }

    /// Validates source selection in `load`.
    ///
    /// Assertions:
    /// - Without a name the file is used.
    /// - With a name, a malformed variable is an error even though a valid
    ///   file exists.
    #[test]
    fn test_load_prefers_env_errors_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spool.toml");
        fs::write(&path, "name = \"from-file\"\n").unwrap();

        let from_file = load_with(vars(&[]), Some(path.clone())).unwrap();
        assert_eq!(from_file.name, "from-file");

        let garbled =
            load_with(vars(&[(WORKER_NAME, "w"), (BREAK_THRESHOLD, "abc")]), Some(path));
        assert!(matches!(garbled, Err(SpoolError::Config(m)) if m.contains(BREAK_THRESHOLD)));
    }

    #[test]
    fn test_parse_config_by_extension() {
        let toml_config =
            parse_config("name = \"t\"\nrequeue_delay = 5", Path::new("spool.toml")).unwrap();
        assert_eq!(toml_config.requeue_delay, Duration::from_millis(5));

        let json_config = parse_config(r#"{"name":"j"}"#, Path::new("spool.json")).unwrap();
        assert_eq!(json_config.name, "j");

        assert!(parse_config("name: y", Path::new("spool.yaml")).is_err());
        assert!(parse_config("name = \"t\"", Path::new("spool")).is_err());
    }

    /// Validates probe order inside one directory and across directories.
    ///
    /// Assertions:
    /// - `spool.toml` wins over `config.json` in the same directory.
    /// - An earlier directory wins over a later one.
    #[test]
    fn test_first_existing_respects_order() {
        let near = TempDir::new().unwrap();
        let far = TempDir::new().unwrap();
        fs::write(near.path().join("config.json"), "{}").unwrap();
        fs::write(far.path().join("spool.toml"), "").unwrap();

        let dirs = vec![near.path().to_path_buf(), far.path().to_path_buf()];
        assert_eq!(first_existing(&dirs), Some(near.path().join("config.json")));

        fs::write(near.path().join("spool.toml"), "").unwrap();
        assert_eq!(first_existing(&dirs), Some(near.path().join("spool.toml")));

        let empty = TempDir::new().unwrap();
        assert_eq!(first_existing(&[empty.path().to_path_buf()]), None);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/spool.toml")));
        assert!(matches!(result, Err(SpoolError::Config(_))));
    }
}
