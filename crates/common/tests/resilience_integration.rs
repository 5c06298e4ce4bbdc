//! Integration tests for resilience module
//!
//! Exercises the layers together the way a worker uses them: a composite
//! policy wrapped around a long-lived loop, breaker trips under sustained
//! failure, and bounded retries for one-off calls.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spool_common::resilience::{
    policies, resolve, resolve_named, wait_strategy, CircuitBreaker, CircuitBreakerConfig,
    CircuitState, MockClock, RetryConfig, RetryError, RetryExecutor, RetryWithBreaker,
};
use spool_domain::{SpoolError, WaitStrategy};

/// Custom error type for testing
#[derive(Debug, Clone, PartialEq, Eq)]
struct TestError {
    message: &'static str,
    retryable: bool,
}

impl TestError {
    const fn transient(message: &'static str) -> Self {
        Self { message, retryable: true }
    }

    const fn fatal(message: &'static str) -> Self {
        Self { message, retryable: false }
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

/// Validates the wait table through the public resolver.
///
/// # Test Steps
/// 1. Resolve every strategy
/// 2. Check attempts 1, 2, 3 and a large attempt
#[test]
fn test_wait_strategy_table() {
    let secs = Duration::from_secs;
    let expectations: [(WaitStrategy, [Duration; 4]); 7] = [
        (WaitStrategy::MinimalWait, [Duration::from_millis(10); 4]),
        (WaitStrategy::ShortWait, [secs(5); 4]),
        (WaitStrategy::LongWait, [secs(10); 4]),
        (WaitStrategy::LinearWait, [secs(5), secs(10), secs(15), secs(500)]),
        (WaitStrategy::LinearWaitLong, [secs(10), secs(20), secs(30), secs(1000)]),
        (WaitStrategy::CappedLinearWait, [secs(5), secs(10), secs(15), secs(60)]),
        (WaitStrategy::CappedLinearWaitLong, [secs(10), secs(20), secs(30), secs(60)]),
    ];

    for (strategy, expected) in expectations {
        let wait = resolve(strategy);
        let actual = [wait(1), wait(2), wait(3), wait(100)];
        assert_eq!(actual, expected, "{strategy}");
    }
}

#[test]
fn test_resolve_named_rejects_unknown() {
    assert!(resolve_named("LinearWaitLong").is_ok());
    assert!(matches!(resolve_named("Forever").err(), Some(SpoolError::InvalidArgument(_))));
}

/// Validates breaker trip and recovery on a mock clock.
///
/// # Test Steps
/// 1. Fail three times against a threshold of three
/// 2. Verify calls are rejected without running
/// 3. Advance past the break duration and succeed
/// 4. Verify the circuit is closed again
#[tokio::test(flavor = "multi_thread")]
async fn test_circuit_breaker_state_transitions() -> anyhow::Result<()> {
    let clock = MockClock::new();
    let config = CircuitBreakerConfig::builder()
        .failure_threshold(3)
        .break_duration(Duration::from_secs(60))
        .build()?;
    let breaker = CircuitBreaker::with_clock(config, clock.clone())?;
    let runs = AtomicU32::new(0);

    for _ in 0..3 {
        let _ = breaker
            .execute(|| async {
                runs.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::transient("down"))
            })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.execute(|| async { Ok::<_, TestError>(()) }).await;
    assert!(rejected.unwrap_err().is_circuit_open());
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    clock.advance(Duration::from_secs(60));
    breaker.execute(|| async { Ok::<_, TestError>(()) }).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    Ok(())
}

/// Validates the composite as a worker would run it: a loop that keeps
/// failing until its dependency comes back.
///
/// # Test Steps
/// 1. Start a composite with threshold 2 and a short break
/// 2. Let the operation fail until a flag is flipped from another task
/// 3. Verify exactly one break per open period and one reset at the end
/// 4. Verify `execute` returned the success value
#[tokio::test(flavor = "multi_thread")]
async fn test_composite_survives_outage() {
    let breaks = Arc::new(AtomicU32::new(0));
    let resets = Arc::new(AtomicU32::new(0));
    let healthy = Arc::new(AtomicBool::new(false));

    let (b, r) = (Arc::clone(&breaks), Arc::clone(&resets));
    let policy = RetryWithBreaker::builder()
        .wait_fn(wait_strategy::fixed(Duration::from_millis(1)))
        .break_threshold(2)
        .break_duration(Duration::from_millis(30))
        .open_circuit_retry_delay(Duration::from_millis(3))
        .on_break(move |_: &TestError, _| {
            b.fetch_add(1, Ordering::SeqCst);
        })
        .on_reset(move || {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let flip = Arc::clone(&healthy);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        flip.store(true, Ordering::SeqCst);
    });

    let started = Instant::now();
    let value = policy
        .execute(|| {
            let healthy = healthy.load(Ordering::SeqCst);
            async move {
                if healthy {
                    Ok("recovered")
                } else {
                    Err(TestError::transient("dependency down"))
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "recovered");
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(breaks.load(Ordering::SeqCst) >= 1);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert_eq!(policy.circuit_state(), CircuitState::Closed);
}

/// Validates that on-retry sees every designated failure with its delay.
#[tokio::test(flavor = "multi_thread")]
async fn test_composite_reports_retries() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let policy = RetryWithBreaker::builder()
        .wait_fn(Arc::new(|attempt: u32| Duration::from_millis(u64::from(attempt))))
        .break_threshold(10)
        .on_retry(move |error: &TestError, delay| recorder.lock().push((error.message, delay)))
        .build()
        .unwrap();
    let calls = AtomicU32::new(0);

    policy
        .execute(|| async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(TestError::transient("first")),
                1 => Err(TestError::transient("second")),
                _ => Ok(()),
            }
        })
        .await
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![("first", Duration::from_millis(1)), ("second", Duration::from_millis(2))]
    );
}

/// Validates the designated-kind filter on the composite.
#[tokio::test(flavor = "multi_thread")]
async fn test_composite_returns_non_designated_error() {
    let policy = RetryWithBreaker::builder()
        .wait_fn(wait_strategy::fixed(Duration::from_millis(1)))
        .retry_policy(policies::PredicateRetry::new(|e: &TestError, _| e.retryable))
        .build()
        .unwrap();
    let calls = AtomicU32::new(0);

    let result: Result<(), TestError> = policy
        .execute(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TestError::transient("blip"))
            } else {
                Err(TestError::fatal("corrupt"))
            }
        })
        .await;

    assert_eq!(result.unwrap_err(), TestError::fatal("corrupt"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(policy.breaker().consecutive_failures(), 1);
}

/// Validates bounded retry with a named strategy and a hook.
///
/// # Test Steps
/// 1. Configure two retries on `MinimalWait`
/// 2. Fail every attempt
/// 3. Verify three attempts, two hook calls at 10 ms, last error kept
#[tokio::test(flavor = "multi_thread")]
async fn test_bounded_retry_exhaustion() {
    let config =
        RetryConfig::builder().retries(2).wait_strategy(WaitStrategy::MinimalWait).build().unwrap();
    let executor = RetryExecutor::new(config, policies::AlwaysRetry);
    let calls = AtomicU32::new(0);
    let mut delays = Vec::new();

    let result: Result<(), _> = executor
        .execute_with_hook(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::transient("nope"))
            },
            |_, _, delay| delays.push(delay),
        )
        .await;

    match result {
        Err(RetryError::AttemptsExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert_eq!(source.message, "nope");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(delays, vec![Duration::from_millis(10); 2]);
}

/// Validates the blocking composite from a plain thread.
#[test]
fn test_blocking_composite_on_thread() {
    let policy = RetryWithBreaker::builder()
        .wait_fn(wait_strategy::fixed(Duration::from_millis(1)))
        .break_threshold(1)
        .break_duration(Duration::from_millis(10))
        .open_circuit_retry_delay(Duration::from_millis(2))
        .build()
        .unwrap();

    let handle = std::thread::spawn(move || {
        let mut attempts = 0;
        policy.call(|| {
            attempts += 1;
            if attempts < 3 {
                Err(TestError::transient("flaky"))
            } else {
                Ok(attempts)
            }
        })
    });

    assert_eq!(handle.join().unwrap().unwrap(), 3);
}
