//! Probar Query: polling query-and-assertion engine for live element trees
//!
//! A test describes what it expects to find as an immutable chain of steps
//! (select, filter, map, transform, assert, act) and the engine keeps
//! re-evaluating the chain against a tree that the system under test is
//! still mutating, until the chain holds or a timeout elapses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PROBAR QUERY Architecture                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Query      │    │ Retry      │    │ Evaluator  │            │
//! │   │ chain      │───►│ strategy + │───►│ (one       │──► Tree    │
//! │   │ (immutable)│    │ tick source│    │  attempt)  │    Access  │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use probar_query::prelude::*;
//! use probar_query::mock::{MemoryTree, Node};
//!
//! # async fn demo() -> QueryResult<()> {
//! let tree = MemoryTree::new();
//! tree.append(tree.root(), Node::new("div").class("name").text("Sally"));
//!
//! let sally = tree
//!     .query()
//!     .find(Criteria::css(".name").with_text("Sally"))
//!     .element()
//!     .await?;
//! assert_eq!(tree.text(sally), "Sally");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod action;
pub mod clock;
mod combinator;
pub mod config;
mod evaluator;
pub mod logging;
mod options;
mod path;
mod query;
mod result;
mod retry;
pub mod scheduler;
mod tree;
mod value;

/// In-memory tree and deterministic tick harness
#[cfg(feature = "mock")]
pub mod mock;

pub use action::ActionGuard;
pub use clock::{create_clock, Clock, FakeClock};
pub use config::{ConfigError, QueryConfig};
pub use evaluator::Evaluator;
pub use options::{Options, OptionsOverride};
pub use path::{Branch, Nested, Path, PathEntry};
pub use query::{NodeId, Query};
pub use result::{ErrorKind, QueryError, QueryResult, RetryMetrics};
pub use retry::{Attempt, IntervalTicks, PollingRetry, RetryOnce, RetryStrategy, TickSource};
pub use tree::{Criteria, ElementView, Items, TreeAccess};
pub use value::{Element, Value};

/// Everything needed to build and run queries
pub mod prelude {
    pub use super::options::*;
    pub use super::query::*;
    pub use super::result::*;
    pub use super::retry::*;
    pub use super::tree::*;
    pub use super::value::*;
}
