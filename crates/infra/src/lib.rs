//! # Spool Infrastructure
//!
//! Process-facing plumbing for Spool workers.
//!
//! This crate contains:
//! - Configuration loading from environment variables, TOML and JSON files
//!
//! ## Architecture
//! - Depends only on `spool-domain`
//! - Contains the code that touches the environment and the filesystem

pub mod config;

pub use config::{load, load_from_env, load_from_file, probe_config_paths};
