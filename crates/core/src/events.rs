//! Worker lifecycle events
//!
//! Every event is logged through `tracing` by the worker itself. Registering
//! a [`WorkerObserver`] additionally delivers it as a [`WorkerEvent`] value,
//! which is what tests and embedding applications usually want.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Why a worker went to `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The drain loop found the queue empty
    Drained,
    /// `stop` was called and the drain task finished in time
    Requested,
    /// `stop` gave up waiting and detached the drain task
    TimedOut,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Drained => "drained",
            Self::Requested => "requested",
            Self::TimedOut => "timed_out",
        })
    }
}

/// Observable worker lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// An item was added to the queue
    ItemInserted,
    /// A drain task was spawned
    Started,
    /// The worker reached `Stopped`
    Stopped {
        /// What ended the drain
        reason: StopReason,
    },
    /// Processing failed; the drain loop resumes after `retry_in`
    ProcessingFailed {
        /// Display form of the processing error
        error: String,
        /// Wait before the drain loop resumes
        retry_in: Duration,
    },
    /// Consecutive failures reached the threshold
    CircuitBroken {
        /// Display form of the failure that tripped the breaker
        error: String,
        /// How long the circuit stays open
        duration: Duration,
    },
    /// A trial call succeeded and the circuit closed
    CircuitRestored,
    /// An item is re-added after `delay`
    ItemRequeued {
        /// Pause before the item is re-added
        delay: Duration,
    },
}

/// Receives worker events, tagged with the worker's name
///
/// Called inline on the thread that produced the event. Observers must not
/// call back into the worker that notified them.
pub trait WorkerObserver: Send + Sync {
    /// Handle one event from the worker named `worker`
    fn on_event(&self, worker: &str, event: &WorkerEvent);
}

impl<F> WorkerObserver for F
where
    F: Fn(&str, &WorkerEvent) + Send + Sync,
{
    fn on_event(&self, worker: &str, event: &WorkerEvent) {
        self(worker, event);
    }
}

/// Worker name plus optional observer, shared by the worker and the policy
/// callbacks it installs
#[derive(Clone)]
pub(crate) struct EventSink {
    worker: Arc<str>,
    observer: Option<Arc<dyn WorkerObserver>>,
}

impl EventSink {
    pub(crate) fn new(worker: &str, observer: Option<Arc<dyn WorkerObserver>>) -> Self {
        Self { worker: Arc::from(worker), observer }
    }

    pub(crate) fn worker(&self) -> &str {
        &self.worker
    }

    pub(crate) fn emit(&self, event: WorkerEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&self.worker, &event);
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("worker", &self.worker)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
