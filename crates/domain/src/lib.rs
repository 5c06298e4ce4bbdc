//! # Spool Domain
//!
//! Shared value types for Spool workers.
//!
//! This crate contains:
//! - Worker lifecycle status and item priority types
//! - The named wait strategies used between retries
//! - Worker configuration and its defaults
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Spool crates
//! - Only external dependencies allowed
//! - Pure values, no runtime or I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::serde::duration_millis;
