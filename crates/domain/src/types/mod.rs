//! Domain types shared by queues, policies and workers

pub mod priority;
pub mod status;
pub mod wait;

pub use priority::{ItemPriority, Prioritized};
pub use status::WorkerStatus;
pub use wait::WaitStrategy;
