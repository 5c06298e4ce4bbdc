//! Testing utilities and helpers
//!
//! - **[`async_utils`]**: eventual-consistency assertions and timeouts for
//!   async tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use spool_common::testing::timeout_ok;
//!
//! let value = timeout_ok(Duration::from_secs(1), async { 42 }).await.unwrap();
//! spool_common::assert_eventually_async!(Duration::from_secs(1), async { value == 42 });
//! ```

pub mod async_utils;

// Note: `assert_eventually_async!` is exported at the crate root
pub use async_utils::{poll_until, timeout_ok};
