//! Modular common utilities shared across Spool crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: work queues (FIFO and three-tier priority)
//! - `runtime`: async resilience (wait strategies, circuit breaker, retry,
//!   composite policy)
//! - `observability`: tracing for the tiers above (implied by `runtime`)
//! - `test-utils`: async assertions for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod collections;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use collections::{FifoQueue, PriorityQueue, WorkQueue};
#[cfg(feature = "runtime")]
pub use resilience::{
    resolve, resolve_named, CircuitBreaker, CircuitBreakerConfig, CircuitState, Clock,
    ConfigError, MockClock, ResilienceError, RetryDecision, RetryExecutor, RetryPolicy,
    RetryWithBreaker, RetryWithBreakerBuilder, SystemClock, WaitFn,
};
