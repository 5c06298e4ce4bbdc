//! Unbounded retry wrapped around a circuit breaker
//!
//! [`RetryWithBreaker`] stacks three layers, innermost first:
//!
//! 1. **Circuit breaker**: counts consecutive designated failures. At the
//!    threshold it opens for the break duration and fires `on_break`. A
//!    successful half-open trial closes it and fires `on_reset`.
//! 2. **Open-circuit retry**: while the breaker rejects calls, waits a fixed
//!    delay and asks again, forever.
//! 3. **Operation retry**: after a designated failure, fires `on_retry` with
//!    the delay from the wait function and tries again, forever.
//!
//! The wrapped operation therefore only returns on success or on an error the
//! retry policy does not designate. Dropping the returned future is the only
//! other way out. Callbacks run inline; a panicking callback unwinds through
//! the caller.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use spool_domain::constants::DEFAULT_OPEN_CIRCUIT_RETRY_DELAY_MS;
use spool_domain::{WaitStrategy, WorkerConfig};
use tracing::{debug, instrument};

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Clock, ConfigError, ConfigResult,
    SystemClock,
};
use super::retry::policies::AlwaysRetry;
use super::retry::{RetryDecision, RetryPolicy};
use super::wait_strategy::{self, WaitFn};

/// Called before each operation-retry sleep with the error and the delay
pub type RetryCallback<E> = Arc<dyn Fn(&E, Duration) + Send + Sync>;

/// Called when the circuit opens with the error and the break duration
pub type BreakCallback<E> = Arc<dyn Fn(&E, Duration) + Send + Sync>;

/// Called when a half-open trial succeeds and the circuit closes
pub type ResetCallback = Arc<dyn Fn() + Send + Sync>;

type SharedPolicy<E> = Arc<dyn RetryPolicy<E> + Send + Sync>;

/// Composite retry-forever policy over a circuit breaker
pub struct RetryWithBreaker<E, C: Clock = SystemClock> {
    breaker: CircuitBreaker<C>,
    wait: WaitFn,
    open_circuit_delay: Duration,
    designated: SharedPolicy<E>,
    on_retry: Option<RetryCallback<E>>,
    on_break: Option<BreakCallback<E>>,
    on_reset: Option<ResetCallback>,
}

impl<E, C: Clock> fmt::Debug for RetryWithBreaker<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryWithBreaker")
            .field("breaker", &self.breaker)
            .field("open_circuit_delay", &self.open_circuit_delay)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> RetryWithBreaker<E> {
    /// Start building a policy on the system clock
    #[must_use]
    pub fn builder() -> RetryWithBreakerBuilder<E> {
        RetryWithBreakerBuilder::new()
    }
}

impl<E, C: Clock> RetryWithBreaker<E, C> {
    /// The breaker guarding the operation
    pub const fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Current breaker state
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Run `operation` until it succeeds or fails with a non-designated error
    ///
    /// Attempt numbers passed to the wait function and the retry policy
    /// start at 1 and count consecutive designated failures. A rejection by
    /// the open circuit restarts the count, so the trial after a break is
    /// attempt 1 again.
    ///
    /// # Errors
    /// Returns the first error the retry policy does not designate, unchanged.
    #[instrument(skip_all, fields(threshold = self.breaker.config().failure_threshold))]
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0_u32;
        loop {
            if !self.breaker.try_acquire() {
                debug!(delay = ?self.open_circuit_delay, "Circuit open, waiting before next attempt");
                attempt = 0;
                tokio::time::sleep(self.open_circuit_delay).await;
                continue;
            }

            match operation().await {
                Ok(value) => {
                    self.succeeded();
                    return Ok(value);
                }
                Err(error) => {
                    attempt = attempt.saturating_add(1);
                    let Some(delay) = self.failed(&error, attempt) else {
                        return Err(error);
                    };
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Blocking counterpart of [`execute`](Self::execute)
    ///
    /// Sleeps the calling thread; do not call from inside an async task.
    ///
    /// # Errors
    /// Returns the first error the retry policy does not designate, unchanged.
    #[instrument(skip_all, fields(threshold = self.breaker.config().failure_threshold))]
    pub fn call<F, T>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0_u32;
        loop {
            if !self.breaker.try_acquire() {
                debug!(delay = ?self.open_circuit_delay, "Circuit open, waiting before next attempt");
                attempt = 0;
                std::thread::sleep(self.open_circuit_delay);
                continue;
            }

            match operation() {
                Ok(value) => {
                    self.succeeded();
                    return Ok(value);
                }
                Err(error) => {
                    attempt = attempt.saturating_add(1);
                    let Some(delay) = self.failed(&error, attempt) else {
                        return Err(error);
                    };
                    std::thread::sleep(delay);
                }
            }
        }
    }

    fn succeeded(&self) {
        if self.breaker.record_success() {
            if let Some(on_reset) = &self.on_reset {
                on_reset();
            }
        }
    }

    /// Settle a failure; `None` means the error is not designated
    fn failed(&self, error: &E, attempt: u32) -> Option<Duration> {
        let delay = match self.designated.should_retry(error, attempt) {
            RetryDecision::Stop => {
                self.breaker.release_trial();
                return None;
            }
            RetryDecision::Retry => (self.wait)(attempt),
            RetryDecision::RetryAfter(delay) => delay,
        };

        if self.breaker.record_failure() {
            if let Some(on_break) = &self.on_break {
                on_break(error, self.breaker.config().break_duration);
            }
        }

        if let Some(on_retry) = &self.on_retry {
            on_retry(error, delay);
        }
        Some(delay)
    }
}

/// Builder for [`RetryWithBreaker`]
pub struct RetryWithBreakerBuilder<E, C: Clock = SystemClock> {
    wait: WaitFn,
    breaker: CircuitBreakerConfig,
    open_circuit_delay: Duration,
    designated: SharedPolicy<E>,
    on_retry: Option<RetryCallback<E>>,
    on_break: Option<BreakCallback<E>>,
    on_reset: Option<ResetCallback>,
    clock: C,
}

impl<E, C: Clock> fmt::Debug for RetryWithBreakerBuilder<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryWithBreakerBuilder")
            .field("breaker", &self.breaker)
            .field("open_circuit_delay", &self.open_circuit_delay)
            .finish_non_exhaustive()
    }
}

impl<E: 'static> RetryWithBreakerBuilder<E> {
    /// Defaults: `LinearWait`, threshold 5, 60 s break, 1 s open-circuit delay,
    /// every error designated
    #[must_use]
    pub fn new() -> Self {
        Self {
            wait: wait_strategy::resolve(WaitStrategy::default()),
            breaker: CircuitBreakerConfig::default(),
            open_circuit_delay: Duration::from_millis(DEFAULT_OPEN_CIRCUIT_RETRY_DELAY_MS),
            designated: Arc::new(AlwaysRetry),
            on_retry: None,
            on_break: None,
            on_reset: None,
            clock: SystemClock,
        }
    }
}

impl<E: 'static> Default for RetryWithBreakerBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static, C: Clock> RetryWithBreakerBuilder<E, C> {
    /// Take wait strategy, threshold, break duration and open-circuit delay
    /// from a worker configuration
    #[must_use]
    pub fn worker_config(self, config: &WorkerConfig) -> Self {
        self.wait_strategy(config.wait_strategy)
            .break_threshold(config.break_threshold)
            .break_duration(config.break_duration)
            .open_circuit_retry_delay(config.open_circuit_retry_delay)
    }

    #[must_use]
    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait = wait_strategy::resolve(strategy);
        self
    }

    #[must_use]
    pub fn wait_fn(mut self, wait: WaitFn) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub const fn break_threshold(mut self, threshold: u32) -> Self {
        self.breaker.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn break_duration(mut self, duration: Duration) -> Self {
        self.breaker.break_duration = duration;
        self
    }

    #[must_use]
    pub const fn open_circuit_retry_delay(mut self, delay: Duration) -> Self {
        self.open_circuit_delay = delay;
        self
    }

    /// Errors this policy decides to retry are the designated kind; all
    /// others are returned to the caller unchanged
    #[must_use]
    pub fn retry_policy<P>(mut self, policy: P) -> Self
    where
        P: RetryPolicy<E> + Send + Sync + 'static,
    {
        self.designated = Arc::new(policy);
        self
    }

    #[must_use]
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&E, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_break<F>(mut self, callback: F) -> Self
    where
        F: Fn(&E, Duration) + Send + Sync + 'static,
    {
        self.on_break = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_reset<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_reset = Some(Arc::new(callback));
        self
    }

    /// Drive the breaker from a custom clock
    #[must_use]
    pub fn clock<C2: Clock>(self, clock: C2) -> RetryWithBreakerBuilder<E, C2> {
        RetryWithBreakerBuilder {
            wait: self.wait,
            breaker: self.breaker,
            open_circuit_delay: self.open_circuit_delay,
            designated: self.designated,
            on_retry: self.on_retry,
            on_break: self.on_break,
            on_reset: self.on_reset,
            clock,
        }
    }

    /// Validate and build the policy
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a zero threshold, zero break
    /// duration or zero open-circuit delay.
    pub fn build(self) -> ConfigResult<RetryWithBreaker<E, C>> {
        if self.open_circuit_delay.is_zero() {
            return Err(ConfigError::invalid("open_circuit_retry_delay must be greater than 0"));
        }

        Ok(RetryWithBreaker {
            breaker: CircuitBreaker::with_clock(self.breaker, self.clock)?,
            wait: self.wait,
            open_circuit_delay: self.open_circuit_delay,
            designated: self.designated,
            on_retry: self.on_retry,
            on_break: self.on_break,
            on_reset: self.on_reset,
        })
    }
}
