//! # Spool Core
//!
//! Background workers that drain a queue on a tokio task.
//!
//! This crate contains:
//! - [`Worker`]: lifecycle, drain loop and shutdown
//! - [`ItemProcessor`]: the per-item logic a consumer plugs in
//! - [`WorkerEvent`] / [`WorkerObserver`]: lifecycle notifications
//!
//! Queues and the retry/circuit-breaker policy live in `spool-common`; this
//! crate only wires them together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use spool_core::{BasicWorker, FnProcessor, ProcessOutcome};
//! use spool_domain::WorkerConfig;
//!
//! let worker: BasicWorker<String> = BasicWorker::new(
//!     WorkerConfig::named("mailer"),
//!     FnProcessor::new(|address: String| async move {
//!         send(&address).await?;
//!         Ok(ProcessOutcome::Completed)
//!     }),
//! )?;
//!
//! worker.add("ops@example.com".to_string())?;
//! worker.stop().await;
//! ```

pub mod events;
pub mod processor;
pub mod worker;

pub use events::{StopReason, WorkerEvent, WorkerObserver};
pub use processor::{FnProcessor, ItemProcessor, ProcessError, ProcessOutcome};
pub use worker::{BasicWorker, PrioritizedWorker, TerminationPredicate, Worker, WorkerBuilder};
