//! Work queues consumed by worker drain loops
//!
//! - **[`FifoQueue`]**: single first-in first-out lane
//! - **[`PriorityQueue`]**: three FIFO lanes (High, Normal, Low) drained
//!   highest first
//!
//! Both implement [`WorkQueue`], which is the only surface a worker needs.
//!
//! ## Usage
//!
//! ```rust
//! use spool_common::collections::{FifoQueue, WorkQueue};
//!
//! let queue = FifoQueue::new();
//! queue.add("a");
//! queue.add("b");
//! assert_eq!(queue.try_get(), Some("a"));
//! assert_eq!(queue.len(), 1);
//! ```

pub mod work_queue;

// Re-export commonly used types
pub use work_queue::{FifoQueue, PriorityQueue, WorkQueue};
