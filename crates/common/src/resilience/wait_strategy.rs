//! Wait-strategy resolution
//!
//! Turns a [`WaitStrategy`] name into a [`WaitFn`], the function retry layers
//! call with the 1-based number of the attempt that just failed.
//!
//! | Strategy | delay(i) |
//! |---|---|
//! | `MinimalWait` | 10 ms |
//! | `ShortWait` | 5 s |
//! | `LongWait` | 10 s |
//! | `LinearWait` | 5·i s |
//! | `LinearWaitLong` | 10·i s |
//! | `CappedLinearWait` | min(5·i s, 60 s) |
//! | `CappedLinearWaitLong` | min(10·i s, 60 s) |

use std::sync::Arc;
use std::time::Duration;

use spool_domain::constants::{
    LINEAR_LONG_STEP_SECS, LINEAR_STEP_SECS, LONG_WAIT_SECS, MINIMAL_WAIT_MS, SHORT_WAIT_SECS,
    WAIT_CAP_SECS,
};
use spool_domain::{Result, WaitStrategy};

/// Delay to apply after the given (1-based) failed attempt
pub type WaitFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Compute the delay of `strategy` after attempt `attempt`
///
/// Attempt `0` is treated as attempt `1`.
#[must_use]
pub fn delay_for(strategy: WaitStrategy, attempt: u32) -> Duration {
    let attempt = u64::from(attempt.max(1));
    let cap = Duration::from_secs(WAIT_CAP_SECS);

    match strategy {
        WaitStrategy::MinimalWait => Duration::from_millis(MINIMAL_WAIT_MS),
        WaitStrategy::ShortWait => Duration::from_secs(SHORT_WAIT_SECS),
        WaitStrategy::LongWait => Duration::from_secs(LONG_WAIT_SECS),
        WaitStrategy::LinearWait => linear(LINEAR_STEP_SECS, attempt),
        WaitStrategy::LinearWaitLong => linear(LINEAR_LONG_STEP_SECS, attempt),
        WaitStrategy::CappedLinearWait => linear(LINEAR_STEP_SECS, attempt).min(cap),
        WaitStrategy::CappedLinearWaitLong => linear(LINEAR_LONG_STEP_SECS, attempt).min(cap),
    }
}

fn linear(step_secs: u64, attempt: u64) -> Duration {
    Duration::from_secs(step_secs.saturating_mul(attempt))
}

/// Resolve a strategy into its wait function
#[must_use]
pub fn resolve(strategy: WaitStrategy) -> WaitFn {
    Arc::new(move |attempt| delay_for(strategy, attempt))
}

/// Resolve a strategy by name (case-insensitive)
///
/// # Errors
/// Returns `SpoolError::InvalidArgument` for a name that matches no strategy.
pub fn resolve_named(name: &str) -> Result<WaitFn> {
    Ok(resolve(name.parse()?))
}

/// Wait function that ignores the attempt number
#[must_use]
pub fn fixed(delay: Duration) -> WaitFn {
    Arc::new(move |_| delay)
}
