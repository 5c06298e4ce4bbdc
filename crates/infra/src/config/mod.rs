//! Worker configuration loading
//!
//! Builds a validated [`spool_domain::WorkerConfig`] from environment
//! variables or a configuration file.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
