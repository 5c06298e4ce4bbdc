//! Worker defaults
//!
//! Centralized location for the default values used by worker configuration
//! and the wait-strategy table.

// Worker configuration defaults
pub const DEFAULT_WORKER_NAME: &str = "worker";
pub const DEFAULT_BREAK_THRESHOLD: u32 = 5;
pub const DEFAULT_BREAK_DURATION_MS: u64 = 60_000;
pub const DEFAULT_TERMINATION_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_REQUEUE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_OPEN_CIRCUIT_RETRY_DELAY_MS: u64 = 1_000;

// Wait-strategy table
pub const MINIMAL_WAIT_MS: u64 = 10;
pub const SHORT_WAIT_SECS: u64 = 5;
pub const LONG_WAIT_SECS: u64 = 10;
pub const LINEAR_STEP_SECS: u64 = 5;
pub const LINEAR_LONG_STEP_SECS: u64 = 10;
pub const WAIT_CAP_SECS: u64 = 60;
