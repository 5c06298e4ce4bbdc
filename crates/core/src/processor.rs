//! Per-item processing contract
//!
//! A worker owns no business logic of its own. Consumers hand it an
//! [`ItemProcessor`], either a type implementing the trait or a closure
//! wrapped in [`FnProcessor`].

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use spool_domain::SpoolError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// What the worker should do with an item after processing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome<T> {
    /// The item is done
    Completed,
    /// Re-add this item after the configured requeue delay
    ///
    /// The processor chooses what goes back: the original item or a
    /// transformed one.
    Requeue(T),
}

impl<T> ProcessOutcome<T> {
    /// Whether the item goes back on the queue
    #[must_use]
    pub const fn is_requeue(&self) -> bool {
        matches!(self, Self::Requeue(_))
    }
}

/// Failure raised by a processor
///
/// Returned errors are handed to the worker's retry policy; they never reach
/// the caller that queued the item.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProcessError {
    /// Failure with a message and no underlying cause
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`
    #[must_use]
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Message without the source chain
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SpoolError> for ProcessError {
    fn from(error: SpoolError) -> Self {
        Self::with_source(error.to_string(), error)
    }
}

/// Processing logic a worker runs for each dequeued item
#[async_trait]
pub trait ItemProcessor<T>: Send + Sync {
    /// Process one item
    ///
    /// # Errors
    /// Any error is treated as a processing failure and retried by the
    /// worker's policy. The item itself is not re-delivered.
    async fn process(&self, item: T) -> Result<ProcessOutcome<T>, ProcessError>;
}

/// Adapter turning an async closure into an [`ItemProcessor`]
///
/// ```rust
/// use spool_core::{FnProcessor, ItemProcessor, ProcessError, ProcessOutcome};
///
/// fn assert_processor<P: ItemProcessor<String>>(_: &P) {}
///
/// let processor = FnProcessor::new(|line: String| async move {
///     if line.is_empty() {
///         return Err(ProcessError::new("empty line"));
///     }
///     Ok(ProcessOutcome::<String>::Completed)
/// });
/// assert_processor(&processor);
/// ```
#[derive(Clone)]
pub struct FnProcessor<F> {
    handler: F,
}

impl<F> FnProcessor<F> {
    /// Wrap `handler`, called once per item
    #[must_use]
    pub const fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcessor").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, F, Fut> ItemProcessor<T> for FnProcessor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProcessOutcome<T>, ProcessError>> + Send,
{
    async fn process(&self, item: T) -> Result<ProcessOutcome<T>, ProcessError> {
        (self.handler)(item).await
    }
}
