//! Consecutive-failure circuit breaker
//!
//! The breaker counts consecutive failures while closed. Reaching the
//! threshold opens it for `break_duration`; calls made while open are
//! rejected without running the operation. Once the duration has elapsed a
//! single trial call is let through (half-open): success closes the circuit,
//! failure opens it again for another full duration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Source of monotonic time for the breaker
///
/// Production code uses [`SystemClock`]; tests drive a [`MockClock`] to cross
/// the break duration without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

impl From<ConfigError> for spool_domain::SpoolError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid { message } => Self::Config(message),
        }
    }
}

/// Errors returned by breaker-protected calls
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen,

    /// The underlying operation failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether the call was rejected by an open circuit
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }

    /// The operation's own error, if the operation ran and failed
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::CircuitOpen => None,
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Break duration elapsed; one trial call decides the next state
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before a trial call
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: spool_domain::constants::DEFAULT_BREAK_THRESHOLD,
            break_duration: Duration::from_millis(
                spool_domain::constants::DEFAULT_BREAK_DURATION_MS,
            ),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a zero threshold or zero duration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }

        if self.break_duration.is_zero() {
            return Err(ConfigError::invalid("break_duration must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn break_duration(mut self, duration: Duration) -> Self {
        self.config.break_duration = duration;
        self
    }

    /// Validate and return the configuration
    ///
    /// # Errors
    /// See [`CircuitBreakerConfig::validate`].
    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    const fn closed() -> Self {
        Self {
            circuit: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Circuit breaker over consecutive failures
///
/// All transitions happen under one `parking_lot::Mutex`; the lock is never
/// held while the protected operation runs.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    clock: C,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &state.circuit)
            .field("consecutive_failures", &state.consecutive_failures)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker on the system clock
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the configuration does not validate.
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing)
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the configuration does not validate.
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, state: Mutex::new(BreakerState::closed()), clock })
    }

    /// The validated configuration
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as last recorded
    ///
    /// An open circuit whose duration has elapsed still reports `Open` until
    /// the next [`try_acquire`](Self::try_acquire) moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.state.lock().circuit
    }

    /// Consecutive failures counted since the last success or reset
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Ask for permission to run one call
    ///
    /// Returns `false` while open. After the break duration the first caller
    /// gets the single half-open trial; later callers are rejected until that
    /// trial is recorded.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        match state.circuit {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .is_some_and(|at| self.clock.now().duration_since(at) >= self.config.break_duration);
                if elapsed {
                    state.circuit = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    debug!("Circuit breaker half-open, allowing trial call");
                }
                elapsed
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    false
                } else {
                    state.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful call
    ///
    /// Returns `true` when this success closed a half-open circuit.
    pub fn record_success(&self) -> bool {
        let mut state = self.state.lock();
        let was_half_open = state.circuit == CircuitState::HalfOpen;
        *state = BreakerState::closed();
        if was_half_open {
            info!("Circuit breaker closed after successful trial call");
        }
        was_half_open
    }

    /// Record a counted failure
    ///
    /// Returns `true` when this failure opened the circuit, either by reaching
    /// the threshold while closed or by failing the half-open trial.
    pub fn record_failure(&self) -> bool {
        let mut state = self.state.lock();
        match state.circuit {
            CircuitState::Closed => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.circuit = CircuitState::Open;
                    state.opened_at = Some(self.clock.now());
                    warn!(
                        failures = state.consecutive_failures,
                        "Circuit breaker opened after consecutive failures"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                state.circuit = CircuitState::Open;
                state.opened_at = Some(self.clock.now());
                state.trial_in_flight = false;
                warn!("Circuit breaker reopened after failed trial call");
                true
            }
            CircuitState::Open => false,
        }
    }

    /// Give back a half-open trial whose outcome should not count
    ///
    /// Used when the trial call failed with an error the caller does not treat
    /// as a breaker failure. No-op in any other state.
    pub fn release_trial(&self) {
        let mut state = self.state.lock();
        if state.circuit == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    /// Force the circuit closed and clear the failure count
    pub fn reset(&self) {
        *self.state.lock() = BreakerState::closed();
        info!("Circuit breaker manually reset to closed state");
    }

    /// Execute an async operation, counting every error as a failure
    ///
    /// # Errors
    /// `CircuitOpen` if the call was rejected, `OperationFailed` with the
    /// operation's error otherwise.
    #[instrument(skip(self, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_filtered(operation, |_| true).await
    }

    /// Execute an async operation, counting only errors matched by `counts`
    ///
    /// Errors that `counts` rejects are still returned as `OperationFailed`
    /// but leave the failure count untouched.
    ///
    /// # Errors
    /// `CircuitOpen` if the call was rejected, `OperationFailed` with the
    /// operation's error otherwise.
    pub async fn execute_filtered<F, Fut, T, E, P>(
        &self,
        operation: F,
        counts: P,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        if !self.try_acquire() {
            debug!("Circuit breaker rejecting call - state: {}", self.state());
            return Err(ResilienceError::CircuitOpen);
        }

        let result = operation().await;
        self.settle(result, counts)
    }

    /// Synchronous counterpart of [`execute`](Self::execute)
    ///
    /// # Errors
    /// `CircuitOpen` if the call was rejected, `OperationFailed` with the
    /// operation's error otherwise.
    #[instrument(skip(self, operation), fields(state = %self.state()))]
    pub fn call<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.try_acquire() {
            debug!("Circuit breaker rejecting call - state: {}", self.state());
            return Err(ResilienceError::CircuitOpen);
        }

        self.settle(operation(), |_| true)
    }

    fn settle<T, E, P>(&self, result: Result<T, E>, counts: P) -> ResilienceResult<T, E>
    where
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                if counts(&error) {
                    self.record_failure();
                } else {
                    self.release_trial();
                }
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }
}
