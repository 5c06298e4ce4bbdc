//! Resilience patterns wrapped around worker drain loops
//!
//! This module provides:
//! - **Wait strategies**: named delay schedules resolved into [`WaitFn`]s
//! - **Circuit Breaker**: consecutive-failure breaker with a single
//!   half-open trial
//! - **Retry Logic**: bounded retries driven by a [`RetryPolicy`]
//! - **Composite policy**: [`RetryWithBreaker`], the retry-forever stack
//!   workers run their drain loop under
//!
//! Everything is generic over the operation's error type and independent of
//! the worker, so each layer can be used and tested on its own.

pub mod circuit_breaker;
pub mod policy;
pub mod retry;
pub mod wait_strategy;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitState, Clock,
    ConfigError, ConfigResult, MockClock, ResilienceError, ResilienceResult, SystemClock,
};
// Re-export composite policy types
pub use policy::{
    BreakCallback, ResetCallback, RetryCallback, RetryWithBreaker, RetryWithBreakerBuilder,
};
// Re-export retry types
pub use retry::{
    policies, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult,
};
pub use wait_strategy::{delay_for, resolve, resolve_named, WaitFn};
