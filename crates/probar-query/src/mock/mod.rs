//! Test doubles for driving queries without a browser.
//!
//! - [`MemoryTree`]: an in-memory element tree implementing
//!   [`crate::TreeAccess`] with a small selector subset
//! - [`TickHarness`]: a deterministic tick source with a fake clock and
//!   deferred mutations

mod harness;
mod selector;
mod tree;

pub use harness::TickHarness;
pub use tree::{MemoryTree, Node};
