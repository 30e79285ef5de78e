//! Terminal calls: one-shot and polling evaluation.
//!
//! Each call allocates its own [`ActionGuard`], so actions run at most once
//! per call however many attempts the retry strategy makes.

use tracing::debug;

use crate::action::ActionGuard;
use crate::evaluator::Evaluator;
use crate::query::Query;
use crate::result::QueryResult;
use crate::value::Value;

/// Exactly one attempt against the present state
pub fn once(query: &Query) -> QueryResult<Value> {
    let mut guard = ActionGuard::new();
    Evaluator::new(&mut guard).evaluate(query)
}

/// Attempts driven by the chain's retry strategy until it succeeds or the
/// strategy gives up
pub async fn poll(query: Query) -> QueryResult<Value> {
    let options = query.get_options();
    debug!(?query, timeout_ms = options.timeout.as_millis() as u64, "polling query");

    let mut guard = ActionGuard::new();
    let mut attempt = || Evaluator::new(&mut guard).evaluate(&query);
    options.retry.retry(&mut attempt, options.timeout).await
}
