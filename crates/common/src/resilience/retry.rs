//! Bounded retry with named wait strategies
//!
//! [`RetryExecutor`] runs an operation up to `max_attempts` times, sleeping
//! between failures according to a [`WaitFn`]. A [`RetryPolicy`] decides per
//! error whether it is worth another attempt. The same policy trait marks the
//! designated error kind of the unbounded [`RetryWithBreaker`] composite.
//!
//! [`RetryWithBreaker`]: super::policy::RetryWithBreaker

use std::fmt;
use std::future::Future;
use std::time::Duration;

use spool_domain::constants::DEFAULT_BREAK_THRESHOLD;
use spool_domain::WaitStrategy;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use super::wait_strategy::{self, WaitFn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All attempts failed; carries the last error
    #[error("All retry attempts exhausted after {attempts} tries")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The policy declined to retry this error
    #[error("Operation failed with non-retryable error")]
    NonRetryable {
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// The error returned by the last attempt
    pub fn into_source(self) -> E {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide what to do after `attempt` (1-based) failed with `error`
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the wait strategy's delay
    Retry,
    /// Retry after a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Configuration for bounded retries
#[derive(Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after each failed attempt
    pub wait: WaitFn,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig").field("max_attempts", &self.max_attempts).finish_non_exhaustive()
    }
}

impl Default for RetryConfig {
    /// One attempt plus five retries on `LinearWait`
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_BREAK_THRESHOLD + 1,
            wait: wait_strategy::resolve(WaitStrategy::LinearWait),
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when `max_attempts` is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`] with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Number of retries after the first attempt
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.config.max_attempts = retries.saturating_add(1);
        self
    }

    #[must_use]
    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.config.wait = wait_strategy::resolve(strategy);
        self
    }

    #[must_use]
    pub fn wait_fn(mut self, wait: WaitFn) -> Self {
        self.config.wait = wait;
        self
    }

    /// Validate and return the configuration
    ///
    /// # Errors
    /// See [`RetryConfig::validate`].
    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Bounded retry executor
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> fmt::Debug for RetryExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn step<E>(&self, error: &E, attempt: u32) -> Step
    where
        P: RetryPolicy<E>,
    {
        match self.policy.should_retry(error, attempt) {
            RetryDecision::Stop => Step::Stop,
            _ if attempt >= self.config.max_attempts => Step::Exhausted,
            RetryDecision::Retry => Step::Wait((self.config.wait)(attempt)),
            RetryDecision::RetryAfter(delay) => Step::Wait(delay),
        }
    }

    /// Execute an operation with retry logic
    ///
    /// # Errors
    /// `NonRetryable` when the policy stops, `AttemptsExhausted` after the
    /// last allowed attempt fails.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_hook(operation, |_, _, _| {}).await
    }

    /// Execute with a hook called before each retry sleep
    ///
    /// The hook receives the error, the number of the attempt that failed and
    /// the delay about to be slept.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_with_hook<F, Fut, T, E, H>(
        &self,
        mut operation: F,
        mut on_retry: H,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&E, u32, Duration),
    {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    log_success(attempt);
                    return Ok(value);
                }
                Err(error) => error,
            };

            let pending = self.step(&error, attempt).into_delay(error, attempt)?;
            tokio::time::sleep(pending.notify(&mut on_retry, attempt)).await;
        }
    }

    /// Blocking counterpart of [`execute`](Self::execute)
    ///
    /// Sleeps the calling thread between attempts; do not call from inside an
    /// async task.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub fn call<F, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Result<T, E>,
    {
        self.call_with_hook(operation, |_, _, _| {})
    }

    /// Blocking counterpart of [`execute_with_hook`](Self::execute_with_hook)
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub fn call_with_hook<F, T, E, H>(&self, mut operation: F, mut on_retry: H) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Result<T, E>,
        H: FnMut(&E, u32, Duration),
    {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let error = match operation() {
                Ok(value) => {
                    log_success(attempt);
                    return Ok(value);
                }
                Err(error) => error,
            };

            let pending = self.step(&error, attempt).into_delay(error, attempt)?;
            std::thread::sleep(pending.notify(&mut on_retry, attempt));
        }
    }
}

/// What to do after a failed attempt
enum Step {
    Wait(Duration),
    Stop,
    Exhausted,
}

/// A pending retry: the failed attempt's error and the delay before the next
struct Pending<E> {
    error: E,
    delay: Duration,
}

impl Step {
    fn into_delay<E: fmt::Debug>(self, error: E, attempt: u32) -> Result<Pending<E>, RetryError<E>> {
        match self {
            Self::Wait(delay) => Ok(Pending { error, delay }),
            Self::Stop => {
                debug!("Retry policy determined not to retry: {:?}", error);
                Err(RetryError::NonRetryable { source: error })
            }
            Self::Exhausted => {
                warn!(attempts = attempt, "All retry attempts exhausted, last error: {:?}", error);
                Err(RetryError::AttemptsExhausted { attempts: attempt, source: error })
            }
        }
    }
}

impl<E: fmt::Debug> Pending<E> {
    fn notify<H: FnMut(&E, u32, Duration)>(self, on_retry: &mut H, attempt: u32) -> Duration {
        warn!("Operation failed (attempt {}), retrying after {:?}: {:?}", attempt, self.delay, self.error);
        on_retry(&self.error, attempt, self.delay);
        self.delay
    }
}

fn log_success(attempt: u32) {
    if attempt > 1 {
        debug!("Operation succeeded after {} retries", attempt - 1);
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy
    ///
    /// Retries exactly the errors for which the predicate returns `true`.
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub const fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for bounded retry
    //!
    //! Delays use `MinimalWait` or zero-length custom waits so the suite stays
    //! fast.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::policies::*;
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Failure {
        Transient,
        Fatal,
    }

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .wait_fn(wait_strategy::fixed(Duration::from_millis(1)))
            .build()
            .unwrap()
    }

    /// Validates the default bounded configuration.
    ///
    /// Assertions:
    /// - Six attempts in total (five retries).
    /// - Waits follow `LinearWait`.
    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 6);
        assert_eq!((config.wait)(2), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_validation() {
        assert!(RetryConfig::builder().max_attempts(0).build().is_err());
        assert_eq!(RetryConfig::builder().retries(2).build().unwrap().max_attempts, 3);
        let config = RetryConfig::builder().wait_strategy(WaitStrategy::ShortWait).build().unwrap();
        assert_eq!((config.wait)(9), Duration::from_secs(5));
    }

    /// Validates eventual success within the attempt limit.
    ///
    /// Assertions:
    /// - The value of the first successful attempt is returned.
    /// - The hook saw each failed attempt number in order.
    #[tokio::test]
    async fn test_execute_succeeds_after_failures() {
        let executor = RetryExecutor::new(quick(5), AlwaysRetry);
        let calls = AtomicU32::new(0);
        let mut seen = Vec::new();

        let result = executor
            .execute_with_hook(
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(Failure::Transient)
                    } else {
                        Ok(n)
                    }
                },
                |_, attempt, _| seen.push(attempt),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_execute_exhausts_attempts() {
        let executor = RetryExecutor::new(quick(3), AlwaysRetry);
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), Failure> = executor
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::Transient)
            })
            .await;

        match result {
            Err(RetryError::AttemptsExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source, Failure::Transient);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// Validates that the policy filters the retried kind.
    ///
    /// Assertions:
    /// - A fatal error stops after one attempt with `NonRetryable`.
    #[tokio::test]
    async fn test_predicate_policy_stops_on_fatal() {
        let policy = PredicateRetry::new(|error: &Failure, _| *error == Failure::Transient);
        let executor = RetryExecutor::new(quick(5), policy);
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), Failure> = executor
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::Fatal)
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetryable { source: Failure::Fatal })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_after_overrides_wait() {
        struct Fixed;
        impl RetryPolicy<Failure> for Fixed {
            fn should_retry(&self, _error: &Failure, _attempt: u32) -> RetryDecision {
                RetryDecision::RetryAfter(Duration::from_millis(2))
            }
        }

        let config = RetryConfig::builder().max_attempts(2).build().unwrap();
        let executor = RetryExecutor::new(config, Fixed);
        let mut delays = Vec::new();
        let _ = executor
            .execute_with_hook(|| async { Err::<(), _>(Failure::Transient) }, |_, _, d| delays.push(d))
            .await;
        assert_eq!(delays, vec![Duration::from_millis(2)]);
    }

    #[test]
    fn test_blocking_call() {
        let executor = RetryExecutor::new(quick(4), AlwaysRetry);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = executor.call(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Failure::Transient)
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_never_retry_blocking() {
        let executor = RetryExecutor::with_policy(NeverRetry);
        let result: RetryResult<(), Failure> = executor.call(|| Err(Failure::Fatal));
        assert_eq!(result.unwrap_err().into_source(), Failure::Fatal);
    }
}
