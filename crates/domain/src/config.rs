//! Worker configuration
//!
//! [`WorkerConfig`] holds the plain values a worker is built from. Every field
//! has a default, so partial TOML or JSON documents are accepted; durations
//! are expressed in milliseconds on the wire.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BREAK_DURATION_MS, DEFAULT_BREAK_THRESHOLD, DEFAULT_OPEN_CIRCUIT_RETRY_DELAY_MS,
    DEFAULT_REQUEUE_DELAY_MS, DEFAULT_TERMINATION_TIMEOUT_MS, DEFAULT_WORKER_NAME,
};
use crate::{duration_millis, Result, SpoolError, WaitStrategy};

/// Settings for a single worker and the policy wrapping its drain loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Log identity of the worker
    pub name: String,
    /// Delay schedule between failed drain attempts
    pub wait_strategy: WaitStrategy,
    /// Consecutive failures that open the circuit
    pub break_threshold: u32,
    /// How long the circuit stays open before a trial call
    #[serde(with = "duration_millis")]
    pub break_duration: Duration,
    /// Upper bound on how long `stop` waits for the drain task
    #[serde(with = "duration_millis")]
    pub termination_timeout: Duration,
    /// Pause before a requeued item is added back
    #[serde(with = "duration_millis")]
    pub requeue_delay: Duration,
    /// Fixed delay between attempts while the circuit is open
    #[serde(with = "duration_millis")]
    pub open_circuit_retry_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKER_NAME.to_string(),
            wait_strategy: WaitStrategy::default(),
            break_threshold: DEFAULT_BREAK_THRESHOLD,
            break_duration: Duration::from_millis(DEFAULT_BREAK_DURATION_MS),
            termination_timeout: Duration::from_millis(DEFAULT_TERMINATION_TIMEOUT_MS),
            requeue_delay: Duration::from_millis(DEFAULT_REQUEUE_DELAY_MS),
            open_circuit_retry_delay: Duration::from_millis(DEFAULT_OPEN_CIRCUIT_RETRY_DELAY_MS),
        }
    }
}

impl WorkerConfig {
    /// Default configuration under the given worker name
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_break_threshold(mut self, threshold: u32) -> Self {
        self.break_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    #[must_use]
    pub const fn with_termination_timeout(mut self, timeout: Duration) -> Self {
        self.termination_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_requeue_delay(mut self, delay: Duration) -> Self {
        self.requeue_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_open_circuit_retry_delay(mut self, delay: Duration) -> Self {
        self.open_circuit_retry_delay = delay;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `SpoolError::Config` for an empty name, a zero break threshold,
    /// or a zero break duration or open-circuit delay.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SpoolError::config("worker name must not be empty"));
        }

        if self.break_threshold == 0 {
            return Err(SpoolError::config("break_threshold must be greater than 0"));
        }

        if self.break_duration.is_zero() {
            return Err(SpoolError::config("break_duration must be greater than 0"));
        }

        if self.open_circuit_retry_delay.is_zero() {
            return Err(SpoolError::config("open_circuit_retry_delay must be greater than 0"));
        }

        Ok(())
    }
}
