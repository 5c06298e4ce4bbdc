//! Unbounded, internally synchronized work queues.
//!
//! **Complexity**
//! - `add` and `try_get` complete in `O(1)` amortized.
//!
//! **Thread Safety**
//! - All operations take `&self`; any number of producers may `add` while one
//!   consumer calls `try_get`.
//! - Locks are `parking_lot::Mutex`, held only for the single push or pop.
//!
//! **Emptiness**
//! - [`FifoQueue::is_empty`] is exact at the instant it is sampled.
//! - [`PriorityQueue::is_empty`] samples each tier under its own lock, so a
//!   concurrent `add` can make the combined answer stale. Only `try_get` is
//!   authoritative.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use spool_domain::{ItemPriority, Prioritized};

/// Queue contract used by workers
///
/// `add` never blocks on capacity and never fails. `try_get` never waits: it
/// returns `None` when nothing is queued.
pub trait WorkQueue<T>: Send + Sync {
    /// Enqueue an item
    fn add(&self, item: T);

    /// Dequeue the next item, if any
    fn try_get(&self) -> Option<T>;

    /// Whether no item is currently queued
    fn is_empty(&self) -> bool;

    /// Number of queued items
    fn len(&self) -> usize;
}

//==============================================================================
// FIFO
//==============================================================================

/// Single-lane first-in first-out queue
pub struct FifoQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> FifoQueue<T> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self { items: Mutex::new(VecDeque::new()) }
    }

    /// Create an empty queue with room for `capacity` items before reallocating
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { items: Mutex::new(VecDeque::with_capacity(capacity)) }
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FifoQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoQueue").field("len", &self.items.lock().len()).finish()
    }
}

impl<T: Send> WorkQueue<T> for FifoQueue<T> {
    fn add(&self, item: T) {
        self.items.lock().push_back(item);
    }

    fn try_get(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

//==============================================================================
// Priority
//==============================================================================

/// Three-tier queue: High, then Normal, then Low, FIFO within a tier
///
/// Items are routed by [`Prioritized::item_priority`] at the moment they are
/// added. A non-empty higher tier always wins at the instant of dequeue.
pub struct PriorityQueue<T> {
    high: FifoQueue<T>,
    normal: FifoQueue<T>,
    low: FifoQueue<T>,
}

impl<T> PriorityQueue<T> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self { high: FifoQueue::new(), normal: FifoQueue::new(), low: FifoQueue::new() }
    }

    const fn tier(&self, priority: ItemPriority) -> &FifoQueue<T> {
        match priority {
            ItemPriority::High => &self.high,
            ItemPriority::Normal => &self.normal,
            ItemPriority::Low => &self.low,
        }
    }
}

impl<T: Send> PriorityQueue<T> {
    /// Number of items queued in one tier
    pub fn tier_len(&self, priority: ItemPriority) -> usize {
        self.tier(priority).len()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("high", &self.high)
            .field("normal", &self.normal)
            .field("low", &self.low)
            .finish()
    }
}

impl<T: Prioritized + Send> WorkQueue<T> for PriorityQueue<T> {
    fn add(&self, item: T) {
        self.tier(item.item_priority()).add(item);
    }

    fn try_get(&self) -> Option<T> {
        ItemPriority::DESCENDING.into_iter().find_map(|priority| self.tier(priority).try_get())
    }

    fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty() && self.low.is_empty()
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }
}
