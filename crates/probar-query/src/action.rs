//! At-most-once guard for action steps.
//!
//! A polling call re-evaluates its whole chain on every attempt, but the
//! side effect of an action step must happen only once. Each terminal call
//! owns one [`ActionGuard`]; the first evaluation of an action node stores
//! its outcome in the guard and later attempts of the same call replay it.
//! Chains themselves carry no call state, so the same chain may be awaited
//! again and will act again.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::query::NodeId;
use crate::result::QueryResult;
use crate::value::Value;

/// Memoised action outcomes for one terminal call
#[derive(Debug, Default)]
pub struct ActionGuard {
    slots: HashMap<NodeId, QueryResult<Value>>,
}

impl ActionGuard {
    /// Guard with no recorded actions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `effect` the first time `node` is reached; replay its outcome
    /// afterwards
    pub fn invoke<F>(&mut self, node: NodeId, effect: F) -> QueryResult<Value>
    where
        F: FnOnce() -> QueryResult<Value>,
    {
        if let Some(outcome) = self.slots.get(&node) {
            trace!(?node, "replaying action outcome");
            return outcome.clone();
        }

        debug!(?node, "running action");
        let outcome = effect();
        self.slots.insert(node, outcome.clone());
        outcome
    }

    /// Whether `node` already ran
    #[must_use]
    pub fn has_run(&self, node: NodeId) -> bool {
        self.slots.contains_key(&node)
    }

    /// Number of distinct actions that ran
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no action ran
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
