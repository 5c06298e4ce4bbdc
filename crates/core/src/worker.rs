//! Queue-draining background worker
//!
//! A [`Worker`] owns one queue and at most one live drain task. Adding an
//! item to a stopped worker starts it; the drain task processes items one at
//! a time and marks the worker stopped once it finds the queue empty. The
//! whole drain loop runs under a [`RetryWithBreaker`] policy, so a failing
//! processor backs off and eventually trips the breaker instead of killing
//! the task. A processor that panics is treated the same way: the panic is
//! caught, the item is dropped and the failure goes through the policy.
//!
//! # Shutdown
//!
//! [`Worker::stop`] is cooperative. It cancels the drain task and waits for
//! it up to the configured termination timeout, then marks the worker
//! stopped regardless. The drain loop only honors cancellation once the
//! termination predicate holds (by default: the queue is empty), so a stop
//! request never cuts a non-empty drain short. A task that outlives the
//! timeout is detached, not aborted, and an `add` racing with `stop` may
//! start a second drain task alongside it.

use std::fmt;
use std::any::Any;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use spool_common::collections::{FifoQueue, PriorityQueue, WorkQueue};
use spool_common::resilience::RetryWithBreaker;
use spool_domain::{Result, SpoolError, WorkerConfig, WorkerStatus};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{EventSink, StopReason, WorkerEvent, WorkerObserver};
use crate::processor::{ItemProcessor, ProcessError, ProcessOutcome};

/// Decides whether a cancelled drain loop may exit
pub type TerminationPredicate<Q> = Arc<dyn Fn(&Q) -> bool + Send + Sync>;

/// Worker draining a single FIFO queue
pub type BasicWorker<T> = Worker<T, FifoQueue<T>>;

/// Worker draining a three-tier priority queue
pub type PrioritizedWorker<T> = Worker<T, PriorityQueue<T>>;

/// Cloneable handle to a background worker
///
/// Clones share the queue, the status and the drain task.
pub struct Worker<T, Q = FifoQueue<T>> {
    inner: Arc<WorkerInner<T, Q>>,
}

impl<T, Q> Clone for Worker<T, Q> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T, Q> fmt::Debug for Worker<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.inner.config.name)
            .field("status", &self.inner.lifecycle.lock().status)
            .finish_non_exhaustive()
    }
}

impl<T, Q> Worker<T, Q>
where
    T: Send + 'static,
    Q: WorkQueue<T> + Default + 'static,
{
    /// Create a worker with an empty queue on the current tokio runtime
    ///
    /// # Errors
    /// Returns `SpoolError::Config` if `config` is invalid and
    /// `SpoolError::Runtime` when called outside a tokio runtime.
    pub fn new<P>(config: WorkerConfig, processor: P) -> Result<Self>
    where
        P: ItemProcessor<T> + 'static,
    {
        Self::builder(processor).config(config).build()
    }

    /// Start configuring a worker with an empty queue
    pub fn builder<P>(processor: P) -> WorkerBuilder<T, Q>
    where
        P: ItemProcessor<T> + 'static,
    {
        WorkerBuilder::with_queue(Q::default(), processor)
    }
}

impl<T, Q> Worker<T, Q>
where
    T: Send + 'static,
    Q: WorkQueue<T> + 'static,
{
    /// Enqueue an item, starting the worker if it is stopped
    ///
    /// Processing failures never surface here; they are handled by the
    /// worker's retry policy.
    ///
    /// # Errors
    /// Returns an error only if the worker had to start and its retry policy
    /// could not be built. The item stays queued in that case.
    pub fn add(&self, item: T) -> Result<()> {
        self.inner.add(item)
    }

    /// Spawn the drain task unless one is already running
    ///
    /// # Errors
    /// Returns `SpoolError::Config` if the retry policy cannot be built from
    /// the worker configuration.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Request cancellation and wait for the drain task, bounded by the
    /// termination timeout
    ///
    /// The worker is `Stopped` when this returns, even if the drain task is
    /// still finishing in the background. `Stopped` is only reported to the
    /// observer if the worker was still running, so a drain that already
    /// reported `Drained` is not followed by a second event.
    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    /// Current lifecycle status
    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        self.inner.lifecycle.lock().status
    }

    /// Number of items waiting in the queue
    ///
    /// An item being processed is no longer counted.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Whether the queue holds no waiting items
    ///
    /// The drain task may still be working on the last dequeued item; check
    /// [`status`](Self::status) to know whether the worker has stopped.
    #[must_use]
    pub fn is_queue_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Worker name, used as its log identity
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Validated configuration the worker was built with
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }
}

/// Builder for [`Worker`]
pub struct WorkerBuilder<T, Q> {
    config: WorkerConfig,
    queue: Q,
    processor: Arc<dyn ItemProcessor<T>>,
    observer: Option<Arc<dyn WorkerObserver>>,
    can_terminate: Option<TerminationPredicate<Q>>,
    runtime: Option<Handle>,
}

impl<T, Q> fmt::Debug for WorkerBuilder<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerBuilder")
            .field("config", &self.config)
            .field("observed", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl<T, Q> WorkerBuilder<T, Q>
where
    T: Send + 'static,
    Q: WorkQueue<T> + 'static,
{
    /// Start from an existing queue, which may already hold items
    pub fn with_queue<P>(queue: Q, processor: P) -> Self
    where
        P: ItemProcessor<T> + 'static,
    {
        Self {
            config: WorkerConfig::default(),
            queue,
            processor: Arc::new(processor),
            observer: None,
            can_terminate: None,
            runtime: None,
        }
    }

    /// Worker configuration, validated by [`build`](Self::build)
    #[must_use]
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive every [`WorkerEvent`](crate::WorkerEvent) this worker emits
    #[must_use]
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: WorkerObserver + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Replace the "queue is empty" check a cancelled drain loop waits for
    #[must_use]
    pub fn termination_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Q) -> bool + Send + Sync + 'static,
    {
        self.can_terminate = Some(Arc::new(predicate));
        self
    }

    /// Spawn drain tasks on `handle` instead of the current runtime
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validate the configuration and create the worker, initially stopped
    ///
    /// # Errors
    /// Returns `SpoolError::Config` for an invalid configuration and
    /// `SpoolError::Runtime` when no runtime handle was given and none is
    /// current.
    pub fn build(self) -> Result<Worker<T, Q>> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|err| {
                SpoolError::Runtime(format!("worker '{}' needs a tokio runtime: {err}", self.config.name))
            })?,
        };
        let can_terminate = match self.can_terminate {
            Some(predicate) => predicate,
            None => {
                let queue_empty: TerminationPredicate<Q> = Arc::new(|queue: &Q| queue.is_empty());
                queue_empty
            }
        };
        let events = EventSink::new(&self.config.name, self.observer);

        Ok(Worker {
            inner: Arc::new(WorkerInner {
                config: self.config,
                queue: self.queue,
                processor: self.processor,
                events,
                can_terminate,
                runtime,
                lifecycle: Mutex::new(Lifecycle::default()),
                _item: PhantomData,
            }),
        })
    }
}

/// Status, cancellation token and task handle; only touched under one lock
#[derive(Default)]
struct Lifecycle {
    status: WorkerStatus,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct WorkerInner<T, Q> {
    config: WorkerConfig,
    queue: Q,
    processor: Arc<dyn ItemProcessor<T>>,
    events: EventSink,
    can_terminate: TerminationPredicate<Q>,
    runtime: Handle,
    lifecycle: Mutex<Lifecycle>,
    _item: PhantomData<fn(T)>,
}

impl<T, Q> WorkerInner<T, Q>
where
    T: Send + 'static,
    Q: WorkQueue<T> + 'static,
{
    fn add(self: &Arc<Self>, item: T) -> Result<()> {
        self.queue.add(item);
        info!(worker = self.events.worker(), queued = self.queue.len(), "Item inserted");
        self.events.emit(WorkerEvent::ItemInserted);

        if self.lifecycle.lock().status.is_running() {
            return Ok(());
        }
        self.start()
    }

    fn start(self: &Arc<Self>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.status.is_running() {
            return Ok(());
        }

        let policy = self.build_policy()?;
        let cancel = CancellationToken::new();
        let task = self.runtime.spawn(Arc::clone(self).run(policy, cancel.clone()));

        lifecycle.status = WorkerStatus::Running;
        lifecycle.cancel = cancel;
        lifecycle.task = Some(task);
        drop(lifecycle);

        debug!(worker = self.events.worker(), "Worker started");
        self.events.emit(WorkerEvent::Started);
        Ok(())
    }

    async fn stop(&self) {
        let task = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.cancel.cancel();
            lifecycle.task.take()
        };

        let timeout = self.config.termination_timeout;
        let reason = match task {
            Some(task) => match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => StopReason::Requested,
                Ok(Err(err)) => {
                    warn!(worker = self.events.worker(), error = %err, "Drain task ended abnormally");
                    StopReason::Requested
                }
                Err(_) => {
                    warn!(
                        worker = self.events.worker(),
                        ?timeout,
                        "Drain task did not finish in time, detaching it"
                    );
                    StopReason::TimedOut
                }
            },
            None => StopReason::Requested,
        };

        let was_running = {
            let mut lifecycle = self.lifecycle.lock();
            std::mem::replace(&mut lifecycle.status, WorkerStatus::Stopped).is_running()
        };
        if !was_running {
            debug!(worker = self.events.worker(), "Worker already stopped");
            return;
        }
        debug!(worker = self.events.worker(), %reason, "Worker stopped");
        self.events.emit(WorkerEvent::Stopped { reason });
    }

    /// Composite policy for one drain task; every processing error is
    /// designated
    fn build_policy(&self) -> Result<RetryWithBreaker<ProcessError>> {
        let on_retry = self.events.clone();
        let on_break = self.events.clone();
        let on_reset = self.events.clone();

        let policy = RetryWithBreaker::builder()
            .worker_config(&self.config)
            .on_retry(move |err: &ProcessError, delay| {
                error!(worker = on_retry.worker(), error = %err, retry_in = ?delay, "Processing failed");
                on_retry.emit(WorkerEvent::ProcessingFailed {
                    error: err.to_string(),
                    retry_in: delay,
                });
            })
            .on_break(move |err: &ProcessError, duration| {
                error!(worker = on_break.worker(), error = %err, ?duration, "Circuit broken");
                on_break
                    .emit(WorkerEvent::CircuitBroken { error: err.to_string(), duration });
            })
            .on_reset(move || {
                info!(worker = on_reset.worker(), "Circuit restored");
                on_reset.emit(WorkerEvent::CircuitRestored);
            })
            .build()?;
        Ok(policy)
    }

    async fn run(self: Arc<Self>, policy: RetryWithBreaker<ProcessError>, cancel: CancellationToken) {
        let drained = AssertUnwindSafe(policy.execute(|| self.drain(&cancel))).catch_unwind().await;
        let failure = match drained {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("drain task panicked: {}", panic_message(&*payload)),
        };
        error!(worker = self.events.worker(), error = %failure, "Drain loop gave up");
        self.lifecycle.lock().status = WorkerStatus::Stopped;
    }

    /// Run the processor, turning a panic into a [`ProcessError`]
    async fn process(&self, item: T) -> std::result::Result<ProcessOutcome<T>, ProcessError> {
        match AssertUnwindSafe(self.processor.process(item)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(ProcessError::new(format!(
                "processor panicked: {}",
                panic_message(&*payload)
            ))),
        }
    }

    async fn drain(self: &Arc<Self>, cancel: &CancellationToken) -> std::result::Result<(), ProcessError> {
        loop {
            let item = {
                let mut lifecycle = self.lifecycle.lock();
                match self.queue.try_get() {
                    Some(item) => item,
                    None => {
                        lifecycle.status = WorkerStatus::Stopped;
                        drop(lifecycle);
                        debug!(worker = self.events.worker(), "Queue drained, worker stopped");
                        self.events.emit(WorkerEvent::Stopped { reason: StopReason::Drained });
                        return Ok(());
                    }
                }
            };

            if let ProcessOutcome::Requeue(item) = self.process(item).await? {
                self.requeue(item).await?;
            }

            if cancel.is_cancelled() && (self.can_terminate)(&self.queue) {
                debug!(worker = self.events.worker(), "Cancellation honored, leaving drain loop");
                return Ok(());
            }
        }
    }

    async fn requeue(self: &Arc<Self>, item: T) -> Result<()> {
        let delay: Duration = self.config.requeue_delay;
        debug!(worker = self.events.worker(), ?delay, "Requeueing item");
        self.events.emit(WorkerEvent::ItemRequeued { delay });
        tokio::time::sleep(delay).await;
        self.add(item)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
